//! Herald HTTP API: notification routes behind the authorization gate.
//
// Endpoints:
// - GET  /health
// - POST /api/notifications
// - GET  /api/notifications
// - GET  /api/notifications/{id}
// - PUT  /api/notifications/{id}
// - POST /api/admin/notifications/process   (Admin)
// - GET  /api/admin/notifications/due       (Admin)

pub mod middleware;
pub mod routes;
pub mod state;

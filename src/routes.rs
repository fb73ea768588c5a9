// src/routes.rs - Route tree shared by the server and the handler tests
use actix_web::web;
use actix_web_httpauth::middleware::HttpAuthentication;

use crate::auth::jwt_middleware;
use crate::{
    auth_handlers, bin_handlers, handlers, invoice_handlers, monitoring, part_handlers,
    statistics_handlers,
};

pub fn configure(cfg: &mut web::ServiceConfig) {
    let auth_middleware = HttpAuthentication::bearer(jwt_middleware);

    cfg
        // Health check and metrics (no auth)
        .service(
            web::scope("/health")
                .route("", web::get().to(monitoring::health_check))
                .route("/metrics", web::get().to(monitoring::metrics_endpoint))
        )

        .service(
            web::scope("/auth")
                .route("/login", web::post().to(auth_handlers::login))
        )

        // Protected API endpoints
        .service(
            web::scope("/api")
                .wrap(auth_middleware)
                .service(
                    web::scope("/auth")
                        .route("/profile", web::get().to(auth_handlers::get_profile))
                        .route("/capabilities", web::get().to(auth_handlers::get_capabilities))
                )
                .service(
                    web::scope("/users")
                        .route("", web::get().to(auth_handlers::get_users))
                        .route("", web::post().to(auth_handlers::create_user))
                        .route("/{id}", web::put().to(auth_handlers::update_user))
                )
                .route("/dashboard/stats", web::get().to(handlers::get_dashboard_stats))

                // Master data
                .service(
                    web::scope("/parts")
                        .route("", web::get().to(part_handlers::get_parts))
                        .route("", web::post().to(part_handlers::create_part))
                        .route("/{part_number}", web::get().to(part_handlers::get_part))
                )
                .service(
                    web::scope("/invoices")
                        .route("", web::get().to(invoice_handlers::get_invoices))
                        .route("", web::post().to(invoice_handlers::create_invoice))
                        .route("/{invoice_number}", web::get().to(invoice_handlers::get_invoice))
                )

                // Dispatch scanning
                .service(
                    web::scope("/bindata")
                        .route("/bin/{bin_no}", web::get().to(bin_handlers::get_bin))
                        .route("/qr", web::post().to(bin_handlers::create_bin_from_qr))
                        .route("/scan-progress", web::post().to(bin_handlers::record_scan_progress))
                )
                .service(
                    web::scope("/statistics")
                        .route("", web::post().to(statistics_handlers::save_statistics))
                        .route("/{invoice_number}", web::get().to(statistics_handlers::get_statistics))
                )
                .service(
                    web::scope("/invoice-progress")
                        .route("", web::post().to(invoice_handlers::save_invoice_progress))
                        .route("/{invoice_number}", web::get().to(invoice_handlers::get_invoice_progress))
                )
        );
}

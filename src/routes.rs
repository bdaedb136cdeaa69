use crate::{
    api::{attendance, employee, leave, payroll, timesheet},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::web;
use std::sync::Arc;

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    // Helper to build per-route limiter
    fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
        let per_ms = if requests_per_min == 0 {
            1
        } else {
            60_000 / requests_per_min as u64
        };
        let cfg = GovernorConfigBuilder::default()
            .per_millisecond(per_ms)
            .burst_size(requests_per_min)
            .key_extractor(PeerIpKeyExtractor)
            .finish()
            .unwrap();
        Governor::new(&cfg)
    }

    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));

    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(protected_limiter)
            .service(
                web::scope("/attendance")
                    .service(web::resource("").route(web::get().to(attendance::list)))
                    .service(
                        web::resource("/clock-in").route(web::post().to(attendance::clock_in)),
                    )
                    .service(
                        web::resource("/clock-out").route(web::post().to(attendance::clock_out)),
                    )
                    .service(
                        web::resource("/manual").route(web::post().to(attendance::manual_entry)),
                    )
                    .service(
                        web::resource("/bulk-approve")
                            .route(web::put().to(attendance::bulk_approve)),
                    )
                    .service(
                        web::resource("/rules")
                            .route(web::post().to(attendance::create_rule))
                            .route(web::get().to(attendance::list_rules)),
                    )
                    .service(
                        web::resource("/{id}/approve").route(web::put().to(attendance::approve)),
                    )
                    .service(
                        web::resource("/{id}/reject").route(web::put().to(attendance::reject)),
                    ),
            )
            .service(
                web::scope("/leave")
                    .service(
                        web::resource("")
                            .route(web::get().to(leave::leave_list))
                            .route(web::post().to(leave::create_leave)),
                    )
                    .service(
                        web::resource("/types")
                            .route(web::post().to(leave::create_type))
                            .route(web::get().to(leave::list_types)),
                    )
                    .service(
                        web::resource("/balances")
                            .route(web::post().to(leave::seed_balance))
                            .route(web::get().to(leave::balances)),
                    )
                    .service(web::resource("/{id}").route(web::get().to(leave::get_leave)))
                    .service(web::resource("/{id}/activity").route(web::get().to(leave::activity)))
                    .service(
                        web::resource("/{id}/manager-approve")
                            .route(web::put().to(leave::manager_approve)),
                    )
                    .service(
                        web::resource("/{id}/manager-reject")
                            .route(web::put().to(leave::manager_reject)),
                    )
                    .service(
                        web::resource("/{id}/hr-approve").route(web::put().to(leave::hr_approve)),
                    )
                    .service(
                        web::resource("/{id}/hr-reject").route(web::put().to(leave::hr_reject)),
                    )
                    .service(web::resource("/{id}/cancel").route(web::put().to(leave::cancel))),
            )
            .service(
                web::scope("/timesheets")
                    .service(web::resource("").route(web::get().to(timesheet::list)))
                    .service(
                        web::resource("/generate").route(web::post().to(timesheet::generate)),
                    ),
            )
            .service(
                web::scope("/payroll")
                    .service(
                        web::resource("/runs")
                            .route(web::post().to(payroll::create_run))
                            .route(web::get().to(payroll::list_runs)),
                    )
                    .service(web::resource("/runs/{id}").route(web::get().to(payroll::get_run)))
                    .service(
                        web::resource("/runs/{id}/calculate")
                            .route(web::post().to(payroll::calculate)),
                    )
                    .service(
                        web::resource("/runs/{id}/approve").route(web::put().to(payroll::approve)),
                    )
                    .service(
                        web::resource("/runs/{id}/process").route(web::put().to(payroll::process)),
                    )
                    .service(
                        web::resource("/runs/{id}/records")
                            .route(web::get().to(payroll::run_records)),
                    )
                    .service(
                        web::resource("/adjustments")
                            .route(web::post().to(payroll::add_adjustment))
                            .route(web::get().to(payroll::list_adjustments)),
                    ),
            )
            .service(
                web::scope("/employees")
                    .service(
                        web::resource("")
                            .route(web::post().to(employee::register))
                            .route(web::get().to(employee::list_employees)),
                    )
                    .service(web::resource("/{id}").route(web::get().to(employee::get_employee))),
            ),
    );
}

mod common;

use assert_matches::assert_matches;
use chrono::{NaiveDate, NaiveTime};
use rust_decimal_macros::dec;

use common::{seed_default_rule, seed_employee, seed_leave_type, test_pool};
use wfm::error::EngineError;
use wfm::model::attendance::{ApprovalStatus, AttendanceStatus, CaptureMethod};
use wfm::model::employee::{PayBasis, PayFrequency};
use wfm::model::leave::LeaveStatus;
use wfm::model::payroll::RunStatus;
use wfm::service::attendance::{self, ManualEntry};
use wfm::service::leave::{self, CreateLeave};
use wfm::service::payroll::{self, CreateRun};
use wfm::service::policy::ZeroPolicy;
use wfm::service::timesheet;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn manual(employee_id: i64, date: NaiveDate, clock_in: NaiveTime, clock_out: NaiveTime) -> ManualEntry {
    ManualEntry {
        employee_id,
        date,
        clock_in: Some(clock_in),
        clock_out: Some(clock_out),
        regular_hours: None,
        overtime_hours: None,
        status: None,
        remarks: None,
    }
}

async fn approved_day(
    pool: &sqlx::SqlitePool,
    employee_id: i64,
    date: NaiveDate,
    clock_in: NaiveTime,
    clock_out: NaiveTime,
) {
    let record = attendance::manual_entry(pool, manual(employee_id, date, clock_in, clock_out))
        .await
        .unwrap();
    attendance::approve(pool, record.id, 1).await.unwrap();
}

fn two_day_leave(leave_type_id: i64) -> CreateLeave {
    CreateLeave {
        leave_type_id,
        start_date: d(2026, 3, 2),
        end_date: d(2026, 3, 3),
        start_time: None,
        end_time: None,
        reason: Some("family".into()),
    }
}

/* =========================
Attendance ledger
========================= */

#[actix_web::test]
async fn clock_cycle_computes_rule_hours() {
    let pool = test_pool().await;
    seed_default_rule(&pool).await;
    let emp = seed_employee(&pool, PayBasis::Hourly, Some(dec!(25)), None).await;

    let record = attendance::clock_in_at(&pool, emp, d(2026, 3, 2), t(9, 0), CaptureMethod::Web)
        .await
        .unwrap();
    assert_eq!(record.status, AttendanceStatus::Working);
    assert_eq!(record.approval_status, ApprovalStatus::Pending);

    let record = attendance::clock_out_at(&pool, emp, d(2026, 3, 2), t(18, 0))
        .await
        .unwrap();
    // 9h minus the auto-deducted hour lands exactly on the threshold
    assert_eq!(record.regular_hours, dec!(8.00));
    assert_eq!(record.overtime_hours, dec!(0.00));
    assert_eq!(record.status, AttendanceStatus::Present);
}

#[actix_web::test]
async fn overtime_splits_past_threshold() {
    let pool = test_pool().await;
    seed_default_rule(&pool).await;
    let emp = seed_employee(&pool, PayBasis::Hourly, Some(dec!(25)), None).await;

    attendance::clock_in_at(&pool, emp, d(2026, 3, 2), t(9, 0), CaptureMethod::Web)
        .await
        .unwrap();
    let record = attendance::clock_out_at(&pool, emp, d(2026, 3, 2), t(19, 30))
        .await
        .unwrap();
    assert_eq!(record.regular_hours, dec!(8.00));
    assert_eq!(record.overtime_hours, dec!(1.50));
}

#[actix_web::test]
async fn open_record_preconditions() {
    let pool = test_pool().await;
    seed_default_rule(&pool).await;
    let emp = seed_employee(&pool, PayBasis::Hourly, Some(dec!(25)), None).await;

    assert_matches!(
        attendance::clock_out_at(&pool, emp, d(2026, 3, 2), t(18, 0)).await,
        Err(EngineError::NoOpenRecord)
    );

    attendance::clock_in_at(&pool, emp, d(2026, 3, 2), t(9, 0), CaptureMethod::Web)
        .await
        .unwrap();
    assert_matches!(
        attendance::clock_in_at(&pool, emp, d(2026, 3, 2), t(9, 5), CaptureMethod::Web).await,
        Err(EngineError::AlreadyClockedIn)
    );

    attendance::clock_out_at(&pool, emp, d(2026, 3, 2), t(18, 0))
        .await
        .unwrap();
    assert_matches!(
        attendance::clock_out_at(&pool, emp, d(2026, 3, 2), t(19, 0)).await,
        Err(EngineError::NoOpenRecord)
    );
}

#[actix_web::test]
async fn approval_only_from_pending() {
    let pool = test_pool().await;
    seed_default_rule(&pool).await;
    let emp = seed_employee(&pool, PayBasis::Hourly, Some(dec!(25)), None).await;

    let record = attendance::manual_entry(&pool, manual(emp, d(2026, 3, 2), t(9, 0), t(18, 0)))
        .await
        .unwrap();

    let approved = attendance::approve(&pool, record.id, 42).await.unwrap();
    assert_eq!(approved.approval_status, ApprovalStatus::Approved);
    assert_eq!(approved.approved_by, Some(42));

    assert_matches!(
        attendance::approve(&pool, record.id, 42).await,
        Err(EngineError::InvalidStateTransition { .. })
    );
    assert_matches!(
        attendance::reject(&pool, record.id, 42, None).await,
        Err(EngineError::InvalidStateTransition { .. })
    );
}

#[actix_web::test]
async fn bulk_approve_reports_tally() {
    let pool = test_pool().await;
    seed_default_rule(&pool).await;
    let emp = seed_employee(&pool, PayBasis::Hourly, Some(dec!(25)), None).await;

    let r1 = attendance::manual_entry(&pool, manual(emp, d(2026, 3, 2), t(9, 0), t(18, 0)))
        .await
        .unwrap();
    let r2 = attendance::manual_entry(&pool, manual(emp, d(2026, 3, 3), t(9, 0), t(18, 0)))
        .await
        .unwrap();
    let r3 = attendance::manual_entry(&pool, manual(emp, d(2026, 3, 4), t(9, 0), t(18, 0)))
        .await
        .unwrap();
    attendance::approve(&pool, r3.id, 1).await.unwrap();

    let outcome = attendance::bulk_approve(&pool, &[r1.id, r2.id, r3.id, 9_999_999], 1)
        .await
        .unwrap();
    assert_eq!(outcome.approved, 2);
    assert_eq!(outcome.skipped, 2);
}

/* =========================
Timesheet aggregation
========================= */

#[actix_web::test]
async fn timesheet_regeneration_is_idempotent() {
    let pool = test_pool().await;
    seed_default_rule(&pool).await;
    let emp = seed_employee(&pool, PayBasis::Hourly, Some(dec!(25)), None).await;
    let bystander = seed_employee(&pool, PayBasis::Hourly, Some(dec!(25)), None).await;

    approved_day(&pool, emp, d(2026, 3, 2), t(9, 0), t(18, 0)).await;
    approved_day(&pool, emp, d(2026, 3, 3), t(9, 0), t(19, 30)).await;
    // bystander has a record that was never approved
    attendance::manual_entry(&pool, manual(bystander, d(2026, 3, 2), t(9, 0), t(18, 0)))
        .await
        .unwrap();

    let sheets = timesheet::generate(&pool, d(2026, 3, 2), d(2026, 3, 6), None, false)
        .await
        .unwrap();
    assert_eq!(sheets.len(), 1);
    assert_eq!(sheets[0].employee_id, emp);
    assert_eq!(sheets[0].total_regular_hours, dec!(16.00));
    assert_eq!(sheets[0].total_overtime_hours, dec!(1.50));
    assert_eq!(sheets[0].present_days, 2);

    // re-run with no attendance changes: identical totals, still one snapshot
    let again = timesheet::generate(&pool, d(2026, 3, 2), d(2026, 3, 6), None, false)
        .await
        .unwrap();
    assert_eq!(again.len(), 1);
    assert_eq!(again[0].total_regular_hours, sheets[0].total_regular_hours);
    assert_eq!(again[0].total_overtime_hours, sheets[0].total_overtime_hours);
    assert_eq!(again[0].present_days, sheets[0].present_days);

    let stored = timesheet::list_timesheets(&pool, Some(emp)).await.unwrap();
    assert_eq!(stored.len(), 1);
}

#[actix_web::test]
async fn timesheet_counts_approved_leave_when_configured() {
    let pool = test_pool().await;
    seed_default_rule(&pool).await;
    let emp = seed_employee(&pool, PayBasis::Hourly, Some(dec!(25)), None).await;
    let leave_type = seed_leave_type(&pool).await;
    leave::seed_balance(&pool, emp, leave_type, 2026, dec!(10), dec!(0), dec!(0))
        .await
        .unwrap();

    approved_day(&pool, emp, d(2026, 3, 2), t(9, 0), t(18, 0)).await;
    approved_day(&pool, emp, d(2026, 3, 3), t(9, 0), t(18, 0)).await;

    // Thu-Fri leave, fully approved
    let request = leave::create_request(
        &pool,
        emp,
        CreateLeave {
            leave_type_id: leave_type,
            start_date: d(2026, 3, 5),
            end_date: d(2026, 3, 6),
            start_time: None,
            end_time: None,
            reason: None,
        },
    )
    .await
    .unwrap();
    leave::manager_approve(&pool, request.id, 2, None).await.unwrap();
    leave::hr_approve(&pool, request.id, 3, None).await.unwrap();

    let sheets = timesheet::generate(&pool, d(2026, 3, 2), d(2026, 3, 6), None, true)
        .await
        .unwrap();
    assert_eq!(sheets.len(), 1);
    assert_eq!(sheets[0].present_days, 2);
    assert_eq!(sheets[0].leave_days, dec!(2));
    // 5 working days - 2 present - 2 on leave
    assert_eq!(sheets[0].absent_days, 1);
}

/* =========================
Leave engine
========================= */

#[actix_web::test]
async fn insufficient_balance_leaves_pending_untouched() {
    let pool = test_pool().await;
    seed_default_rule(&pool).await;
    let emp = seed_employee(&pool, PayBasis::Hourly, Some(dec!(25)), None).await;
    let leave_type = seed_leave_type(&pool).await;
    leave::seed_balance(&pool, emp, leave_type, 2026, dec!(2), dec!(0), dec!(0))
        .await
        .unwrap();

    let err = leave::create_request(
        &pool,
        emp,
        CreateLeave {
            leave_type_id: leave_type,
            start_date: d(2026, 3, 2),
            end_date: d(2026, 3, 4), // 3 days against 2 available
            start_time: None,
            end_time: None,
            reason: None,
        },
    )
    .await
    .unwrap_err();
    assert_matches!(
        err,
        EngineError::InsufficientBalance { available, requested }
            if available == dec!(2) && requested == dec!(3)
    );

    let balances = leave::get_balances(&pool, emp, 2026).await.unwrap();
    assert_eq!(balances[0].pending, dec!(0));
}

#[actix_web::test]
async fn manager_then_hr_reject_restores_pending() {
    let pool = test_pool().await;
    seed_default_rule(&pool).await;
    let emp = seed_employee(&pool, PayBasis::Hourly, Some(dec!(25)), None).await;
    let leave_type = seed_leave_type(&pool).await;
    leave::seed_balance(&pool, emp, leave_type, 2026, dec!(10), dec!(0), dec!(0))
        .await
        .unwrap();

    let request = leave::create_request(&pool, emp, two_day_leave(leave_type))
        .await
        .unwrap();
    assert_eq!(request.status, LeaveStatus::PendingManager);
    let balances = leave::get_balances(&pool, emp, 2026).await.unwrap();
    assert_eq!(balances[0].pending, dec!(2));

    // HR cannot act while the request sits at manager level
    assert_matches!(
        leave::hr_approve(&pool, request.id, 3, None).await,
        Err(EngineError::InvalidStateTransition { .. })
    );

    let request = leave::manager_approve(&pool, request.id, 2, Some("ok".into()))
        .await
        .unwrap();
    assert_eq!(request.status, LeaveStatus::PendingHr);

    let request = leave::hr_reject(&pool, request.id, 3, Some("coverage".into()))
        .await
        .unwrap();
    assert_eq!(request.status, LeaveStatus::Rejected);

    let balances = leave::get_balances(&pool, emp, 2026).await.unwrap();
    assert_eq!(balances[0].pending, dec!(0));
    assert_eq!(balances[0].used, dec!(0));
    assert_eq!(balances[0].available(), dec!(10));

    let activity = leave::get_activity(&pool, request.id).await.unwrap();
    let actions: Vec<&str> = activity.iter().map(|a| a.action.as_str()).collect();
    assert_eq!(actions, ["SUBMIT", "MANAGER_APPROVE", "HR_REJECT"]);
}

#[actix_web::test]
async fn full_approval_converts_pending_to_used() {
    let pool = test_pool().await;
    seed_default_rule(&pool).await;
    let emp = seed_employee(&pool, PayBasis::Hourly, Some(dec!(25)), None).await;
    let leave_type = seed_leave_type(&pool).await;
    leave::seed_balance(&pool, emp, leave_type, 2026, dec!(10), dec!(0), dec!(0))
        .await
        .unwrap();

    let request = leave::create_request(&pool, emp, two_day_leave(leave_type))
        .await
        .unwrap();
    leave::manager_approve(&pool, request.id, 2, None).await.unwrap();
    let request = leave::hr_approve(&pool, request.id, 3, None).await.unwrap();
    assert_eq!(request.status, LeaveStatus::Approved);

    let balances = leave::get_balances(&pool, emp, 2026).await.unwrap();
    assert_eq!(balances[0].pending, dec!(0));
    assert_eq!(balances[0].used, dec!(2));
    assert_eq!(balances[0].available(), dec!(8));
}

#[actix_web::test]
async fn cancel_releases_reservation() {
    let pool = test_pool().await;
    seed_default_rule(&pool).await;
    let emp = seed_employee(&pool, PayBasis::Hourly, Some(dec!(25)), None).await;
    let other = seed_employee(&pool, PayBasis::Hourly, Some(dec!(25)), None).await;
    let leave_type = seed_leave_type(&pool).await;
    leave::seed_balance(&pool, emp, leave_type, 2026, dec!(10), dec!(0), dec!(0))
        .await
        .unwrap();

    let request = leave::create_request(&pool, emp, two_day_leave(leave_type))
        .await
        .unwrap();

    assert_matches!(
        leave::cancel_request(&pool, request.id, other).await,
        Err(EngineError::Validation(_))
    );

    let request = leave::cancel_request(&pool, request.id, emp).await.unwrap();
    assert_eq!(request.status, LeaveStatus::Cancelled);
    let balances = leave::get_balances(&pool, emp, 2026).await.unwrap();
    assert_eq!(balances[0].pending, dec!(0));

    // terminal; nothing further applies
    assert_matches!(
        leave::manager_approve(&pool, request.id, 2, None).await,
        Err(EngineError::InvalidStateTransition { .. })
    );
}

/* =========================
Payroll runs
========================= */

#[actix_web::test]
async fn payroll_run_happy_path() {
    let pool = test_pool().await;
    seed_default_rule(&pool).await;
    let emp = seed_employee(&pool, PayBasis::Hourly, Some(dec!(25)), None).await;

    approved_day(&pool, emp, d(2026, 3, 2), t(9, 0), t(19, 30)).await;
    approved_day(&pool, emp, d(2026, 3, 3), t(9, 0), t(19, 30)).await;
    timesheet::generate(&pool, d(2026, 3, 2), d(2026, 3, 6), None, false)
        .await
        .unwrap();

    let run = payroll::create_run(
        &pool,
        CreateRun {
            period_start: d(2026, 3, 2),
            period_end: d(2026, 3, 6),
            pay_date: d(2026, 3, 13),
            pay_frequency: PayFrequency::Biweekly,
        },
    )
    .await
    .unwrap();
    assert_eq!(run.status, RunStatus::Draft);

    let run = payroll::calculate(&pool, run.id, &ZeroPolicy, dec!(5)).await.unwrap();
    assert_eq!(run.status, RunStatus::Calculated);
    assert_eq!(run.total_employees, 1);
    // 16h * 25 + 3h * 25 * 1.5
    assert_eq!(run.total_gross, dec!(512.50));
    assert_eq!(run.total_net, dec!(512.50));
    assert_eq!(run.total_taxes, dec!(0));

    let records = payroll::records_for_run(&pool, run.id).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].base_pay, dec!(400.00));
    assert_eq!(records[0].overtime_pay, dec!(112.50));
    assert_eq!(records[0].net_pay, dec!(512.50));

    let run = payroll::approve_run(&pool, run.id, 7).await.unwrap();
    assert_eq!(run.status, RunStatus::Approved);
    assert_eq!(run.approved_by, Some(7));

    let run = payroll::process_run(&pool, run.id).await.unwrap();
    assert_eq!(run.status, RunStatus::Processed);

    // records are immutable once processed; recalculation is off the table
    assert_matches!(
        payroll::calculate(&pool, run.id, &ZeroPolicy, dec!(5)).await,
        Err(EngineError::InvalidStateTransition { .. })
    );
}

#[actix_web::test]
async fn recalculation_replaces_records_wholesale() {
    let pool = test_pool().await;
    seed_default_rule(&pool).await;
    let emp = seed_employee(&pool, PayBasis::Hourly, Some(dec!(25)), None).await;

    approved_day(&pool, emp, d(2026, 3, 2), t(9, 0), t(18, 0)).await;
    timesheet::generate(&pool, d(2026, 3, 2), d(2026, 3, 6), None, false)
        .await
        .unwrap();

    let run = payroll::create_run(
        &pool,
        CreateRun {
            period_start: d(2026, 3, 2),
            period_end: d(2026, 3, 6),
            pay_date: d(2026, 3, 13),
            pay_frequency: PayFrequency::Biweekly,
        },
    )
    .await
    .unwrap();
    let run = payroll::calculate(&pool, run.id, &ZeroPolicy, dec!(5)).await.unwrap();
    assert_eq!(run.total_gross, dec!(200.00));

    // corrections arrive: another approved day, timesheets regenerated,
    // run released back to draft by an admin and recalculated
    approved_day(&pool, emp, d(2026, 3, 3), t(9, 0), t(18, 0)).await;
    timesheet::generate(&pool, d(2026, 3, 2), d(2026, 3, 6), None, false)
        .await
        .unwrap();
    sqlx::query("UPDATE payroll_runs SET status = 'DRAFT' WHERE id = ?")
        .bind(run.id)
        .execute(&pool)
        .await
        .unwrap();

    let run = payroll::calculate(&pool, run.id, &ZeroPolicy, dec!(5)).await.unwrap();
    assert_eq!(run.total_gross, dec!(400.00));
    let records = payroll::records_for_run(&pool, run.id).await.unwrap();
    assert_eq!(records.len(), 1);
}

#[actix_web::test]
async fn failed_calculation_rolls_back_to_draft() {
    let pool = test_pool().await;
    seed_default_rule(&pool).await;
    let paid = seed_employee(&pool, PayBasis::Hourly, Some(dec!(25)), None).await;
    let unrated = seed_employee(&pool, PayBasis::Hourly, None, None).await;

    approved_day(&pool, paid, d(2026, 3, 2), t(9, 0), t(18, 0)).await;
    approved_day(&pool, unrated, d(2026, 3, 2), t(9, 0), t(18, 0)).await;
    timesheet::generate(&pool, d(2026, 3, 2), d(2026, 3, 6), None, false)
        .await
        .unwrap();

    let run = payroll::create_run(
        &pool,
        CreateRun {
            period_start: d(2026, 3, 2),
            period_end: d(2026, 3, 6),
            pay_date: d(2026, 3, 13),
            pay_frequency: PayFrequency::Biweekly,
        },
    )
    .await
    .unwrap();

    assert_matches!(
        payroll::calculate(&pool, run.id, &ZeroPolicy, dec!(5)).await,
        Err(EngineError::ReferenceDataMissing(_))
    );

    let run = payroll::get_run(&pool, run.id).await.unwrap();
    assert_eq!(run.status, RunStatus::Draft);
    let records = payroll::records_for_run(&pool, run.id).await.unwrap();
    assert!(records.is_empty());
}

#[actix_web::test]
async fn calculating_claim_is_exclusive() {
    let pool = test_pool().await;
    seed_default_rule(&pool).await;

    let run = payroll::create_run(
        &pool,
        CreateRun {
            period_start: d(2026, 3, 2),
            period_end: d(2026, 3, 6),
            pay_date: d(2026, 3, 13),
            pay_frequency: PayFrequency::Biweekly,
        },
    )
    .await
    .unwrap();

    sqlx::query("UPDATE payroll_runs SET status = 'CALCULATING' WHERE id = ?")
        .bind(run.id)
        .execute(&pool)
        .await
        .unwrap();

    assert_matches!(
        payroll::calculate(&pool, run.id, &ZeroPolicy, dec!(5)).await,
        Err(EngineError::AlreadyCalculating)
    );
}

#[actix_web::test]
async fn approval_gates_on_run_state() {
    let pool = test_pool().await;
    seed_default_rule(&pool).await;

    let run = payroll::create_run(
        &pool,
        CreateRun {
            period_start: d(2026, 3, 2),
            period_end: d(2026, 3, 6),
            pay_date: d(2026, 3, 13),
            pay_frequency: PayFrequency::Biweekly,
        },
    )
    .await
    .unwrap();

    assert_matches!(
        payroll::approve_run(&pool, run.id, 7).await,
        Err(EngineError::InvalidStateTransition { .. })
    );
    assert_matches!(
        payroll::process_run(&pool, run.id).await,
        Err(EngineError::InvalidStateTransition { .. })
    );
}

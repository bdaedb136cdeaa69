use crate::api::attendance::{
    AttendanceListResponse, AttendanceQuery, BulkApproveBody, ClockIn, RejectBody,
};
use crate::api::leave::{
    BalanceQuery, CreateLeaveType, DecisionBody, LeaveFilter, LeaveListResponse, SeedBalance,
};
use crate::api::payroll::AdjustmentQuery;
use crate::api::timesheet::{GeneratePeriod, TimesheetQuery};
use crate::model::attendance::{
    ApprovalStatus, AttendanceRecord, AttendanceRule, AttendanceStatus, CaptureMethod,
};
use crate::model::employee::{Employee, PayBasis, PayFrequency};
use crate::model::leave::{
    LeaveActivity, LeaveBalance, LeaveRequest, LeaveStatus, LeaveTypeRecord, LeaveUnit,
};
use crate::model::payroll::{
    AdjustmentKind, PayAdjustment, PayComponent, PayrollRecord, PayrollRun, RunStatus,
};
use crate::model::timesheet::{Timesheet, TimesheetStatus};
use crate::service::attendance::{BulkApproveOutcome, CreateRule, ManualEntry};
use crate::service::employee::RegisterEmployee;
use crate::service::leave::CreateLeave;
use crate::service::payroll::{CreateAdjustment, CreateRun};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Workforce Management Core API",
        version = "1.0.0",
        description = r#"
## Workforce Management Core

The timesheet aggregation and payroll computation pipeline: raw attendance
events become approved hours, approved hours roll into timesheets, and
timesheets feed payroll runs that compute each employee's gross, deductions
and net pay. A two-level (manager then HR) leave approval machine maintains
the balances consumed by the same pipeline.

### Key Operations
- **Attendance** — clock-in/out, manual entries, approval gate, bulk approval
- **Leave** — balances, two-level request approval, append-only activity log
- **Timesheets** — deterministic, re-runnable aggregation of approved hours
- **Payroll** — DRAFT → CALCULATING → CALCULATED → APPROVED → PROCESSED runs

The caller's identity arrives in `x-actor-id`/`x-actor-role`/`x-employee-id`
headers set by the authenticating gateway.

Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::api::attendance::clock_in,
        crate::api::attendance::clock_out,
        crate::api::attendance::manual_entry,
        crate::api::attendance::approve,
        crate::api::attendance::reject,
        crate::api::attendance::bulk_approve,
        crate::api::attendance::list,
        crate::api::attendance::create_rule,
        crate::api::attendance::list_rules,

        crate::api::leave::create_leave,
        crate::api::leave::manager_approve,
        crate::api::leave::manager_reject,
        crate::api::leave::hr_approve,
        crate::api::leave::hr_reject,
        crate::api::leave::cancel,
        crate::api::leave::get_leave,
        crate::api::leave::activity,
        crate::api::leave::leave_list,
        crate::api::leave::balances,
        crate::api::leave::create_type,
        crate::api::leave::list_types,
        crate::api::leave::seed_balance,

        crate::api::timesheet::generate,
        crate::api::timesheet::list,

        crate::api::payroll::create_run,
        crate::api::payroll::calculate,
        crate::api::payroll::approve,
        crate::api::payroll::process,
        crate::api::payroll::list_runs,
        crate::api::payroll::get_run,
        crate::api::payroll::run_records,
        crate::api::payroll::add_adjustment,
        crate::api::payroll::list_adjustments,

        crate::api::employee::register,
        crate::api::employee::get_employee,
        crate::api::employee::list_employees
    ),
    components(
        schemas(
            AttendanceRecord,
            AttendanceRule,
            AttendanceStatus,
            ApprovalStatus,
            CaptureMethod,
            AttendanceQuery,
            AttendanceListResponse,
            ClockIn,
            RejectBody,
            BulkApproveBody,
            BulkApproveOutcome,
            CreateRule,
            ManualEntry,
            Employee,
            PayBasis,
            PayFrequency,
            RegisterEmployee,
            LeaveRequest,
            LeaveBalance,
            LeaveActivity,
            LeaveTypeRecord,
            LeaveStatus,
            LeaveUnit,
            CreateLeave,
            CreateLeaveType,
            SeedBalance,
            BalanceQuery,
            DecisionBody,
            LeaveFilter,
            LeaveListResponse,
            Timesheet,
            TimesheetStatus,
            GeneratePeriod,
            TimesheetQuery,
            PayrollRun,
            PayrollRecord,
            PayComponent,
            PayAdjustment,
            AdjustmentKind,
            AdjustmentQuery,
            RunStatus,
            CreateRun,
            CreateAdjustment
        )
    ),
    tags(
        (name = "Attendance", description = "Attendance ledger APIs"),
        (name = "Leave", description = "Leave balance and request APIs"),
        (name = "Timesheet", description = "Timesheet aggregation APIs"),
        (name = "Payroll", description = "Payroll run APIs"),
        (name = "Employee", description = "Employee reference data APIs"),
    )
)]
pub struct ApiDoc;

//! Pure payroll arithmetic shared with the salary application: daily-wage
//! proration and attendance-status normalization.

use std::fmt;

/// Daily wage prorated over the applicable month, rounded to the nearest
/// whole unit. A zero-day month yields zero rather than dividing by it.
pub fn daily_wage(base_salary: i64, days_in_month: u32) -> i64 {
    if days_in_month == 0 {
        return 0;
    }
    (base_salary as f64 / days_in_month as f64).round() as i64
}

/// Amount payable for a month given full-day and half-day presence counts.
pub fn monthly_payable(base_salary: i64, days_in_month: u32, present: u32, half_days: u32) -> i64 {
    let wage = daily_wage(base_salary, days_in_month) as f64;
    (wage * (present as f64 + half_days as f64 / 2.0)).round() as i64
}

/// Canonical attendance status. Legacy sheets recorded a zoo of shorthand
/// codes; anything unrecognized counts as absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttendanceStatus {
    Present,
    HalfDay,
    #[default]
    Absent,
}

impl AttendanceStatus {
    pub fn normalize(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "PRESENT" | "P" | "WFH" | "EWFH" => AttendanceStatus::Present,
            "HALF DAY" | "HD" => AttendanceStatus::HalfDay,
            _ => AttendanceStatus::Absent,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "Present",
            AttendanceStatus::HalfDay => "Half Day",
            AttendanceStatus::Absent => "Absent",
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

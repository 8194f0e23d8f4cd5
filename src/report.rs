//! Administrative reporting over a fetched appointment list.

use std::collections::BTreeMap;
use std::io::Write;

use crate::error::PortalResult;
use crate::models::{Appointment, AppointmentType};
use crate::policy;

const CSV_HEADER: &[&str] = &[
    "id",
    "date",
    "time",
    "type",
    "status",
    "patient",
    "rescheduled_by",
    "rejection_reason",
    "notes",
];

/// Per-status and per-type tallies.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StatusSummary {
    pub total: usize,
    pub by_status: BTreeMap<String, usize>,
    pub medical: usize,
    pub dental: usize,
}

impl StatusSummary {
    pub fn from_appointments(appointments: &[Appointment]) -> Self {
        let mut summary = StatusSummary::default();
        for apt in appointments {
            summary.total += 1;
            *summary
                .by_status
                .entry(apt.status.as_str().to_string())
                .or_insert(0) += 1;
            match apt.kind {
                AppointmentType::Medical => summary.medical += 1,
                AppointmentType::Dental => summary.dental += 1,
                AppointmentType::Other(_) => {}
            }
        }
        summary
    }

    pub fn count(&self, status: &str) -> usize {
        self.by_status.get(status).copied().unwrap_or(0)
    }
}

impl std::fmt::Display for StatusSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Total appointments: {}", self.total)?;
        writeln!(f, "  Medical: {}", self.medical)?;
        writeln!(f, "  Dental: {}", self.dental)?;
        for (status, count) in &self.by_status {
            writeln!(f, "  {:<10} {}", status, count)?;
        }
        Ok(())
    }
}

fn csv_field(value: &str) -> String {
    if value.contains(|c: char| matches!(c, ',' | '"' | '\n' | '\r')) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn csv_row<W: Write>(out: &mut W, fields: &[&str]) -> PortalResult<()> {
    let line = fields
        .iter()
        .map(|f| csv_field(f))
        .collect::<Vec<_>>()
        .join(",");
    out.write_all(line.as_bytes())?;
    out.write_all(b"\r\n")?;
    Ok(())
}

/// Write the appointment list as CSV with a header row.
pub fn write_csv<W: Write>(appointments: &[Appointment], mut out: W) -> PortalResult<usize> {
    csv_row(&mut out, CSV_HEADER)?;

    for apt in appointments {
        let id = apt.id.to_string();
        let rescheduled_by = policy::reschedule_attribution(apt)
            .map(|actor| match actor {
                policy::RescheduleActor::Staff => "staff",
                policy::RescheduleActor::Patient => "patient",
            })
            .unwrap_or("");

        csv_row(
            &mut out,
            &[
                id.as_str(),
                apt.appointment_date.as_str(),
                apt.appointment_time.as_str(),
                apt.kind.as_str(),
                apt.status.as_str(),
                apt.patient_name.as_deref().unwrap_or(""),
                rescheduled_by,
                apt.rejection_reason.as_deref().unwrap_or(""),
                apt.notes.as_deref().unwrap_or(""),
            ],
        )?;
    }
    out.flush()?;

    tracing::info!(rows = appointments.len(), "Appointment CSV written");
    Ok(appointments.len())
}

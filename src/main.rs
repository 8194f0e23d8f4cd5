//! Command-line front end for the clinic portal.
//!
//! Each invocation logs in, performs one action against the clinic backend,
//! prints the result, and logs out.

use std::io::{self, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use uhs_portal::documents::DocumentKind;
use uhs_portal::models::{Appointment, AppointmentStatus, AppointmentType};
use uhs_portal::policy::{self, BadgeStyle};
use uhs_portal::report::{self, StatusSummary};
use uhs_portal::{
    AppointmentService, ClinicBackend, HttpBackend, PortalConfig, PortalError, PortalResult,
    SessionContext,
};

#[derive(Parser)]
#[command(name = "uhs-portal")]
#[command(about = "University health services clinic portal")]
struct Cli {
    /// Account email (prompted for when absent)
    #[arg(long, env = "UHS_EMAIL", global = true)]
    email: Option<String>,
    /// Account password (prompted for when absent)
    #[arg(long, env = "UHS_PASSWORD", hide_env_values = true, global = true)]
    password: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List appointments
    List {
        /// Only show appointments with this status
        #[arg(long)]
        status: Option<String>,
    },
    /// Show one appointment with its provenance
    Show { id: i64 },
    /// Book a new appointment
    Book {
        /// Date (YYYY-MM-DD)
        date: String,
        /// Time (HH:MM)
        time: String,
        /// medical or dental
        #[arg(long, default_value = "medical")]
        kind: String,
        /// What the visit is about
        #[arg(long)]
        concern: Option<String>,
    },
    /// Cancel an appointment (at least 3 days ahead)
    Cancel {
        id: i64,
        #[arg(long)]
        reason: Option<String>,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Move an appointment to a new date and time
    Reschedule {
        id: i64,
        /// New date (YYYY-MM-DD)
        date: String,
        /// New time (HH:MM)
        time: String,
        #[arg(long)]
        reason: String,
    },
    /// Change an appointment's status (staff only)
    SetStatus {
        id: i64,
        /// pending, scheduled, confirmed, completed or cancelled
        status: String,
        /// Required when cancelling
        #[arg(long)]
        reason: Option<String>,
    },
    /// Show the patient profile
    Profile,
    /// Fetch a form or medical certificate PDF
    Document {
        id: i64,
        /// view_form_data, download_form_data, view_medical_certificate or download_medical_certificate
        kind: String,
        /// Directory to save into
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Export appointments as CSV
    Export {
        /// Output file (stdout when absent)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print per-status totals
    Summary,
}

fn get_input(prompt: &str) -> io::Result<String> {
    print!("{}: ", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

fn badge(status: &AppointmentStatus) -> String {
    let badge = policy::status_badge(status);
    let marker = match badge.style {
        BadgeStyle::Blue => "[B]",
        BadgeStyle::Green => "[G]",
        BadgeStyle::Red => "[R]",
        BadgeStyle::Yellow => "[Y]",
    };
    format!("{} {}", marker, badge.label)
}

fn print_appointment_line<B: ClinicBackend>(service: &AppointmentService<B>, apt: &Appointment) {
    let modifiable = if service.can_modify(apt) {
        ""
    } else {
        " (locked)"
    };
    println!(
        "  #{:<5} {} {:<8} {:<8} {}{}",
        apt.id,
        apt.appointment_date,
        apt.appointment_time,
        apt.kind,
        badge(&apt.status),
        modifiable
    );
    if let Some(actor) = policy::reschedule_attribution(apt) {
        println!("         {}", actor.label());
    }
}

fn print_appointment_detail<B: ClinicBackend>(service: &AppointmentService<B>, apt: &Appointment) {
    println!("\n{}", "=".repeat(60));
    println!("  Appointment #{}", apt.id);
    println!("{}", "=".repeat(60));
    println!("  Date:     {} {}", apt.appointment_date, apt.appointment_time);
    println!("  Type:     {}", apt.kind);
    println!("  Status:   {}", badge(&apt.status));
    if let Some(name) = &apt.patient_name {
        println!("  Patient:  {}", name);
    }
    if let Some(concern) = &apt.concern {
        println!("  Concern:  {}", concern);
    }
    if let Some(reason) = &apt.rejection_reason {
        println!("  Reason:   {}", reason);
    }

    if let Some(actor) = policy::reschedule_attribution(apt) {
        println!("\n  {}", actor.label());
        if let (Some(date), Some(time)) = (&apt.original_date, &apt.original_time) {
            println!("    Originally: {} {}", date, time);
        }
        if let Some(reason) = &apt.reschedule_reason {
            println!("    Why:        {}", reason);
        }
        if let Some(by) = &apt.rescheduled_by_name {
            println!("    By:         {}", by);
        }
        if let Some(at) = &apt.rescheduled_at {
            println!("    When:       {}", at);
        }
    }
    if let Some(notes) = &apt.notes {
        println!("\n  Notes: {}", notes);
    }

    if service.can_modify(apt) {
        println!("\n  Can be cancelled or rescheduled.");
    } else {
        println!(
            "\n  Changes must be made at least {} days in advance.",
            policy::LEAD_TIME_DAYS
        );
    }
}

fn run<B: ClinicBackend>(
    service: &AppointmentService<B>,
    ctx: &mut SessionContext,
    command: Commands,
) -> PortalResult<()> {
    match command {
        Commands::List { status } => {
            let filter = status.as_deref().map(AppointmentStatus::parse);
            let appointments: Vec<Appointment> = service
                .list(ctx)?
                .into_iter()
                .filter(|a| filter.as_ref().map_or(true, |s| &a.status == s))
                .collect();

            if appointments.is_empty() {
                println!("\nNo appointments found");
                return Ok(());
            }
            println!("\n--- Appointments ({}) ---", appointments.len());
            for apt in &appointments {
                print_appointment_line(service, apt);
            }
        }
        Commands::Show { id } => {
            let apt = service.find(ctx, id)?;
            print_appointment_detail(service, &apt);
        }
        Commands::Book {
            date,
            time,
            kind,
            concern,
        } => {
            let list = service.book(ctx, &date, &time, AppointmentType::parse(&kind), concern)?;
            println!("\nAppointment requested for {} at {}", date, time);
            println!("You now have {} appointment(s)", list.len());
        }
        Commands::Cancel { id, reason, yes } => {
            if !yes {
                let answer = get_input(&format!("Cancel appointment #{}? (y/n)", id))?;
                if answer.to_lowercase() != "y" {
                    println!("Nothing changed");
                    return Ok(());
                }
            }
            let apt = service.cancel(ctx, id, reason)?;
            println!("\nAppointment #{} is now {}", apt.id, badge(&apt.status));
        }
        Commands::Reschedule {
            id,
            date,
            time,
            reason,
        } => {
            let apt = service.reschedule(ctx, id, &date, &time, &reason)?;
            println!(
                "\nAppointment #{} moved to {} {}",
                apt.id, apt.appointment_date, apt.appointment_time
            );
        }
        Commands::SetStatus { id, status, reason } => {
            let apt = service.set_status(ctx, id, AppointmentStatus::parse(&status), reason)?;
            println!("\nAppointment #{} is now {}", apt.id, badge(&apt.status));
        }
        Commands::Profile => {
            let profile = service.backend().get_profile(ctx)?;
            println!("\n--- Patient Profile ---");
            println!("  Name:  {} {}", profile.first_name, profile.last_name);
            println!("  Email: {}", profile.email);
            if let Some(student_id) = &profile.student_id {
                println!("  Student ID: {}", student_id);
            }
            if let Some(dob) = &profile.date_of_birth {
                println!("  Date of birth: {}", dob);
            }
            let conditions = profile.conditions();
            if conditions.is_empty() {
                println!("  Medical history: none recorded");
            } else {
                println!("  Medical history:");
                for condition in conditions {
                    match &condition.diagnosed_on {
                        Some(date) => println!("    - {} (since {})", condition.condition, date),
                        None => println!("    - {}", condition.condition),
                    }
                }
            }
        }
        Commands::Document { id, kind, out } => {
            let kind = DocumentKind::from_endpoint(&kind).ok_or_else(|| {
                PortalError::InvalidInput(format!("Unknown document kind: '{}'", kind))
            })?;
            let document = service.document(ctx, id, kind)?;
            let path = document.save_to(&out)?;
            println!("\nSaved {} ({} bytes)", path.display(), document.bytes.len());
        }
        Commands::Export { out } => {
            let appointments = service.list(ctx)?;
            let rows = match out {
                Some(path) => {
                    let file = std::fs::File::create(&path)?;
                    let rows = report::write_csv(&appointments, io::BufWriter::new(file))?;
                    println!("Wrote {} rows to {}", rows, path.display());
                    rows
                }
                None => report::write_csv(&appointments, io::stdout().lock())?,
            };
            tracing::debug!(rows, "Export finished");
        }
        Commands::Summary => {
            let appointments = service.list(ctx)?;
            print!("\n{}", StatusSummary::from_appointments(&appointments));
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    // --help and usage errors must not depend on the environment being valid.
    let cli = Cli::parse();
    let config = PortalConfig::from_env()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_new(config.log_filter())?)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let email = match cli.email {
        Some(email) => email,
        None => get_input("Email")?,
    };
    let password = match cli.password {
        Some(password) => password,
        None => get_input("Password")?,
    };

    let backend = HttpBackend::from_config(&config)?;
    let service = AppointmentService::new(backend);
    let mut ctx = SessionContext::new();

    let outcome = service
        .backend()
        .login(&mut ctx, &email, &password)
        .and_then(|()| run(&service, &mut ctx, cli.command));

    if ctx.is_authenticated() {
        if let Err(e) = service.backend().logout(&mut ctx) {
            tracing::warn!("Logout failed: {}", e.user_message());
        }
    }

    if let Err(e) = outcome {
        eprintln!("Error: {}", e.user_message());
        std::process::exit(1);
    }
    Ok(())
}

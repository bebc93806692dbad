use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand};
use shared::{
    catalog::{SAFE_WORK_PRACTICES, SAFE_WORK_PROCEDURES},
    content::{resolve_assignment, ContentError},
    domain::{CompanyId, DocumentType, EmployeeId, Role},
    protocol::CompanySafetyRating,
};
use storage::{NewReview, Storage};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "sqlite://./data/reviews.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    CreateCompany {
        name: String,
    },
    CreateEmployee {
        company_id: i64,
        name: String,
        email: String,
        #[arg(long, default_value = "employee")]
        role: Role,
    },
    ListEmployees {
        company_id: i64,
    },
    AssignReview {
        employee_id: i64,
        document_type: DocumentType,
        document_name: String,
        #[arg(long)]
        file_url: Option<String>,
        #[arg(long)]
        template_key: Option<String>,
    },
    ListTemplates,
    Rating {
        company_id: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let cli = Cli::parse();

    if let Command::ListTemplates = cli.command {
        list_templates();
        return Ok(());
    }

    let storage = Storage::new(&cli.database_url).await?;

    match cli.command {
        Command::CreateCompany { name } => {
            let company_id = storage.create_company(&name).await?;
            println!("created company_id={}", company_id.0);
        }
        Command::CreateEmployee {
            company_id,
            name,
            email,
            role,
        } => {
            let company_id = CompanyId(company_id);
            if storage.company_name(company_id).await?.is_none() {
                bail!("company {company_id} does not exist");
            }
            let employee_id = storage
                .create_employee(company_id, &name, &email, role)
                .await?;
            println!("created employee_id={}", employee_id.0);
        }
        Command::ListEmployees { company_id } => {
            for employee in storage.list_employees(CompanyId(company_id)).await? {
                println!(
                    "{:<5} {:<9} {:<28} {}",
                    employee.id.0,
                    employee.role.as_str(),
                    employee.email,
                    employee.name
                );
            }
        }
        Command::AssignReview {
            employee_id,
            document_type,
            document_name,
            file_url,
            template_key,
        } => {
            let employee = storage
                .employee(EmployeeId(employee_id))
                .await?
                .ok_or_else(|| anyhow!("employee {employee_id} does not exist"))?;
            let draft = NewReview {
                company_id: employee.company_id,
                employee_id: employee.id,
                document_type,
                document_name,
                file_url,
                template_key,
            }
            .normalized();
            check_assignment(&draft)?;
            let review = storage.assign_review(&draft).await?;
            info!(
                review_id = review.id.0,
                employee_id = employee.id.0,
                "review assigned"
            );
            println!("review_id={}", review.id.0);
        }
        Command::Rating { company_id } => {
            let company_id = CompanyId(company_id);
            let (total, signed) = storage.review_counts_for_company(company_id).await?;
            let rating = CompanySafetyRating::from_counts(company_id, total, signed);
            println!("{}", format_rating(&rating));
        }
        Command::ListTemplates => {}
    }

    Ok(())
}

/// Refuses assignments that could never open: template types must resolve, others need a file.
fn check_assignment(draft: &NewReview) -> Result<()> {
    if draft.document_name.is_empty() {
        bail!("document name cannot be empty");
    }
    match resolve_assignment(
        draft.document_type,
        &draft.document_name,
        draft.file_url.as_deref(),
        draft.template_key.as_deref(),
    ) {
        Ok(_) => Ok(()),
        Err(ContentError::FileUnavailable) => {
            bail!("{} reviews need --file-url", draft.document_type)
        }
        Err(err @ ContentError::TemplateNotFound { .. }) => {
            bail!("{err}; run list-templates")
        }
    }
}

fn list_templates() {
    println!("safe_work_procedure (--template-key = job type)");
    for entry in SAFE_WORK_PROCEDURES {
        println!("  {:<20} {}", entry.job_type, entry.title);
    }
    println!("safe_work_practice (--template-key = id)");
    for entry in SAFE_WORK_PRACTICES {
        println!("  {:<20} {}", entry.id, entry.title);
    }
}

fn format_rating(rating: &CompanySafetyRating) -> String {
    format!(
        "company={} signed={}/{} score={:.1} band={:?}",
        rating.company_id.0,
        rating.documents_signed,
        rating.documents_total,
        rating.document_review_score,
        rating.band
    )
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;

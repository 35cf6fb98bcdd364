//! `deptrag`: ask questions against department knowledge bases and manage
//! their documents.
//!
//! Usage:
//!   deptrag ask -d it -r "Junior IT Support" "How do I reset my password?"
//!   deptrag chat -d finance -r "Finance Analyst"
//!   deptrag docs add finance ./policies/expenses.txt
//!   deptrag docs show finance expenses.txt
//!   deptrag reindex general
//!   deptrag model set gemini-2.5-pro

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

use deptrag_core::config::{Config, Settings};
use deptrag_core::logging;
use deptrag_core::traits::ModelSelector;
use deptrag_core::types::Answer;
use deptrag_rag::{model_config, sample_questions, Assistant, KnowledgeBase};
use deptrag_vector::Invalidation;

#[derive(Parser)]
#[command(name = "deptrag", version, about = "Department knowledge-base assistant")]
struct Cli {
    /// Directory holding config.toml
    #[arg(long, global = true, default_value = ".")]
    config_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ask a single question
    Ask {
        #[arg(short, long)]
        department: String,
        #[arg(short, long, default_value = "Employee")]
        role: String,
        #[arg(required = true)]
        question: Vec<String>,
    },
    /// Interactive chat on stdin
    Chat {
        #[arg(short, long)]
        department: String,
        #[arg(short, long, default_value = "Employee")]
        role: String,
    },
    /// Drop a department index so the next question rebuilds it ("general" drops all)
    Reindex { department: String },
    /// Generation model selection
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },
    /// List departments and their roles
    Departments,
    /// Manage department documents
    Docs {
        #[command(subcommand)]
        action: DocsAction,
    },
}

#[derive(Subcommand)]
enum ModelAction {
    Show,
    List,
    Set { name: String },
}

#[derive(Subcommand)]
enum DocsAction {
    List { department: String },
    /// Print a document's current content
    Show { department: String, name: String },
    /// Copy a local file into a department (and invalidate its index)
    Add {
        department: String,
        file: PathBuf,
        /// Stored file name; defaults to the source file name
        #[arg(long)]
        name: Option<String>,
    },
    /// Delete a document (and invalidate the department index)
    Remove { department: String, name: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();
    let cli = Cli::parse();
    let settings = Config::load_from(&cli.config_dir)?.settings()?;

    match cli.command {
        Command::Ask { department, role, question } => {
            let assistant = Assistant::from_settings(&settings)?;
            warn_unknown_role(&settings, &department, &role);
            let answer = assistant.answer_question(&department, &question.join(" "), &role).await;
            print_answer(&answer);
        }
        Command::Chat { department, role } => {
            let assistant = Assistant::from_settings(&settings)?;
            warn_unknown_role(&settings, &department, &role);
            chat(&assistant, &department, &role).await?;
        }
        Command::Reindex { department } => {
            let kb = KnowledgeBase::from_settings(&settings);
            report_invalidation(&department, &kb.invalidate(&department).await?);
        }
        Command::Model { action } => {
            let models = model_config(&settings);
            match action {
                ModelAction::Show => println!("{}", models.current_model()),
                ModelAction::List => {
                    let current = models.current_model();
                    for m in models.available_models() {
                        let marker = if *m == current { "*" } else { " " };
                        println!("{marker} {m}");
                    }
                }
                ModelAction::Set { name } => {
                    models.set_current_model(&name)?;
                    println!("Model set to {name}");
                }
            }
        }
        Command::Departments => {
            let kb = KnowledgeBase::from_settings(&settings);
            for dept in kb.list_departments()? {
                let roles = settings.roles_for(&dept);
                if roles.is_empty() {
                    println!("{dept}");
                } else {
                    println!("{dept}: {}", roles.join(", "));
                }
            }
        }
        Command::Docs { action } => {
            let kb = KnowledgeBase::from_settings(&settings);
            match action {
                DocsAction::List { department } => {
                    for name in kb.list_documents(&department)? {
                        println!("{name}");
                    }
                }
                DocsAction::Show { department, name } => {
                    print!("{}", kb.read_document(&department, &name)?);
                }
                DocsAction::Add { department, file, name } => {
                    let name = match name {
                        Some(n) => n,
                        None => file
                            .file_name()
                            .map(|n| n.to_string_lossy().into_owned())
                            .context("source path has no file name")?,
                    };
                    let content = std::fs::read(&file).with_context(|| format!("reading {}", file.display()))?;
                    let path = kb.save_document(&department, &name, content)?;
                    println!("Saved {}", path.display());
                    report_invalidation(&department, &kb.invalidate(&department).await?);
                }
                DocsAction::Remove { department, name } => {
                    kb.delete_document(&department, &name)?;
                    println!("Removed {department}/{name}");
                    report_invalidation(&department, &kb.invalidate(&department).await?);
                }
            }
        }
    }
    Ok(())
}

fn warn_unknown_role(settings: &Settings, department: &str, role: &str) {
    let roles = settings.roles_for(department);
    if !roles.is_empty() && !roles.iter().any(|r| r == role) {
        warn!(department, role, known = %roles.join(", "), "role is not in the department catalogue");
    }
}

fn report_invalidation(department: &str, outcome: &Invalidation) {
    match outcome {
        Invalidation::Cleared { path } => println!("Cleared index for {department} ({})", path.display()),
        Invalidation::NotBuilt => println!("No index built yet for {department}"),
    }
}

fn print_answer(answer: &Answer) {
    println!("{}", answer.text);
    if !answer.sources.is_empty() {
        println!("\nSources:");
        for s in &answer.sources {
            println!("  - {s}");
        }
    }
}

async fn chat(assistant: &Assistant, department: &str, role: &str) -> Result<()> {
    let samples = sample_questions(role);
    println!("Chatting with the {department} knowledge base as {role}. Type /quit to leave.");
    for (i, q) in samples.iter().enumerate() {
        println!("  [{}] {q}", i + 1);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "/quit" || input == "/exit" {
            break;
        }
        let question = match input.parse::<usize>() {
            Ok(n) if (1..=samples.len()).contains(&n) => samples[n - 1].clone(),
            Ok(_) => {
                println!("Pick a sample question between 1 and {}.", samples.len());
                continue;
            }
            Err(_) => input.to_string(),
        };
        let answer = assistant.answer_question(department, &question, role).await;
        print_answer(&answer);
        println!();
    }
    Ok(())
}

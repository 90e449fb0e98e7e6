use clap::{CommandFactory, Parser};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use shaft::cli::{
    self, AccountsCommands, Cli, Commands, ReportCommands, StageCommands, TransactionsCommands,
};

fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "shaft=warn".into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init { data_dir } => cli::init::run(data_dir),
        Commands::Status => cli::status::run(),
        Commands::Accounts { command } => match command {
            AccountsCommands::List => cli::accounts::list(),
            AccountsCommands::Total => cli::accounts::total(),
        },
        Commands::Stage { command } => match command {
            StageCommands::Csv { file, batch } => cli::stage::csv(&file, batch),
            StageCommands::Json { file, batch } => cli::stage::json(&file, batch),
            StageCommands::List { batch } => cli::stage::list(batch.as_deref()),
            StageCommands::Batches => cli::stage::batches(),
            StageCommands::Categorize { batch, response } => cli::stage::categorize(&batch, &response),
            StageCommands::SetCategory { id, category } => cli::stage::set_category(id, &category),
            StageCommands::SetType { id, kind } => cli::stage::set_type(id, &kind),
            StageCommands::Toggle { id } => cli::stage::toggle(id),
            StageCommands::Discard { id } => cli::stage::discard(id),
            StageCommands::Clear { batch } => cli::stage::clear(batch.as_deref()),
            StageCommands::Export { batch, output } => cli::stage::export(&batch, output.as_deref()),
        },
        Commands::Confirm { batch } => cli::confirm::run(batch.as_deref()),
        Commands::Transactions { command } => match command {
            TransactionsCommands::List { from_date, to_date, limit } => {
                cli::transactions::list(from_date, to_date, limit)
            }
            TransactionsCommands::Add {
                date,
                details,
                amount,
                category,
                kind,
                account_id,
            } => cli::transactions::add(date, &details, amount, category.as_deref(), kind.as_deref(), account_id),
            TransactionsCommands::Categorize { id, category } => cli::transactions::categorize(id, &category),
            TransactionsCommands::SetType { id, kind } => cli::transactions::set_type(id, &kind),
            TransactionsCommands::Delete { id } => cli::transactions::delete(id),
        },
        Commands::Report { command } => match command {
            ReportCommands::Expenses {
                period,
                from_date,
                to_date,
            } => cli::report::expenses(period, from_date, to_date),
            ReportCommands::Monthly { year } => cli::report::monthly(year),
            ReportCommands::Daily { limit } => cli::report::daily(limit),
            ReportCommands::NetWorth => cli::report::net_worth(),
        },
        Commands::Categories => cli::categories::list(),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "shaft", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

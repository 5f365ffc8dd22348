use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use chauffeur_core::model::{PageRequest, Role, UserId, VideoId};

#[derive(Parser, Debug, Clone)]
#[command(name = "chauffeur")]
#[command(version, about = "Driver training and admin console for the chauffeur service", long_about = None)]
pub struct Cli {
    /// Base URL of the chauffeur-service REST API
    #[arg(long, global = true, env = "CHAUFFEUR_API_URL", default_value = "http://localhost:8080/api")]
    pub api_url: String,

    /// Local `SQLite` database for the session, completions and consent
    #[arg(long = "db", global = true, env = "CHAUFFEUR_DB_URL", default_value = "sqlite://chauffeur.sqlite3")]
    pub db_url: String,

    /// Access token lifetime used to schedule proactive refreshes
    #[arg(long, global = true, env = "CHAUFFEUR_TOKEN_TTL_SECS", default_value_t = 900)]
    pub token_ttl_secs: u64,

    /// Hard session ceiling measured from sign-in
    #[arg(long, global = true, env = "CHAUFFEUR_SESSION_CEILING_SECS", default_value_t = 28_800)]
    pub session_ceiling_secs: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Sign in to the driver or admin portal
    Login(LoginArgs),
    /// Sign out and forget the stored session
    Logout,
    /// Show the signed-in account, re-synced from the backend
    Whoami,
    /// Create a driver account
    Register(RegisterArgs),
    /// Work through the Code of Conduct training videos
    Train(TrainArgs),
    /// Manage user accounts (admin)
    #[command(subcommand)]
    Users(UsersCommand),
    /// Manage training videos (admin)
    #[command(subcommand)]
    Videos(VideosCommand),
    /// Show or change cookie and analytics consent
    #[command(subcommand)]
    Consent(ConsentCommand),
}

#[derive(Args, Debug, Clone)]
pub struct LoginArgs {
    #[arg(long)]
    pub email: String,
    /// Sign in to the admin portal
    #[arg(long, default_value_t = false)]
    pub admin: bool,
    /// Password; prompted for when omitted
    #[arg(long, env = "CHAUFFEUR_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct RegisterArgs {
    #[arg(long)]
    pub first_name: String,
    #[arg(long)]
    pub last_name: String,
    #[arg(long)]
    pub email: String,
    #[arg(long)]
    pub phone: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct TrainArgs {
    /// Playback speed multiplier for the simulated player
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..=64))]
    pub speed: u32,
}

#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    #[arg(long, default_value_t = 1)]
    pub page: u32,
    #[arg(long, default_value_t = PageRequest::DEFAULT_LIMIT)]
    pub limit: u32,
    #[arg(long)]
    pub search: Option<String>,
}

impl ListArgs {
    pub fn request(&self) -> PageRequest {
        let request = PageRequest::new(self.page, self.limit);
        match &self.search {
            Some(search) => request.with_search(search.as_str()),
            None => request,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct DeleteArgs {
    /// Skip the confirmation prompt
    #[arg(long, short = 'y', default_value_t = false)]
    pub yes: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RoleArg {
    Admin,
    Driver,
}

impl From<RoleArg> for Role {
    fn from(value: RoleArg) -> Self {
        match value {
            RoleArg::Admin => Role::Admin,
            RoleArg::Driver => Role::Driver,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct UserFields {
    #[arg(long)]
    pub first_name: Option<String>,
    #[arg(long)]
    pub last_name: Option<String>,
    #[arg(long)]
    pub email: Option<String>,
    #[arg(long)]
    pub phone: Option<String>,
    #[arg(long, value_enum)]
    pub role: Option<RoleArg>,
    /// Prompt for a new password
    #[arg(long, default_value_t = false)]
    pub set_password: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum UsersCommand {
    /// List one page of users
    List(ListArgs),
    /// Read search terms from stdin, one per line, and list matches
    Search(ListArgs),
    /// Show one user
    Show { id: UserId },
    /// Create a user
    Create(UserFields),
    /// Edit a user, starting from the current record
    Edit {
        id: UserId,
        #[command(flatten)]
        fields: UserFields,
    },
    /// Delete a user
    Delete {
        id: UserId,
        #[command(flatten)]
        confirm: DeleteArgs,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum VideosCommand {
    /// List one page of videos
    List(ListArgs),
    /// Read search terms from stdin, one per line, and list matches
    Search(ListArgs),
    /// Show one video with its quiz
    Show { id: VideoId },
    /// Create a video from a JSON draft file
    Create {
        #[arg(long)]
        file: PathBuf,
    },
    /// Print the editable draft of a video as JSON
    Draft { id: VideoId },
    /// Replace a video with a JSON draft file
    Edit {
        id: VideoId,
        #[arg(long)]
        file: PathBuf,
    },
    /// Move a video in training order
    Order { id: VideoId, order: i64 },
    /// Delete a video
    Delete {
        id: VideoId,
        #[command(flatten)]
        confirm: DeleteArgs,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConsentCommand {
    /// Show the stored decision
    Show,
    /// Allow analytics and marketing
    AcceptAll,
    /// Allow strictly necessary storage only
    NecessaryOnly,
    /// Choose each category
    Set {
        #[arg(long, default_value_t = false)]
        analytics: bool,
        #[arg(long, default_value_t = false)]
        marketing: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn list_args_build_page_requests() {
        let cli = Cli::try_parse_from([
            "chauffeur", "users", "list", "--page", "2", "--search", " dana ",
        ])
        .unwrap();
        let Command::Users(UsersCommand::List(args)) = cli.command else {
            panic!("parsed the wrong command");
        };
        let request = args.request();
        assert_eq!(request.page(), 2);
        assert_eq!(request.limit(), PageRequest::DEFAULT_LIMIT);
        assert_eq!(request.search(), Some("dana"));
    }

    #[test]
    fn ids_parse_from_positional_args() {
        let cli = Cli::try_parse_from(["chauffeur", "videos", "order", "9", "3"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Videos(VideosCommand::Order { id, order: 3 }) if id == VideoId::new(9)
        ));
    }
}

use std::error::Error;

use chauffeur_core::model::{
    ConsentPreferences, Page, Registration, User, UserDraft, Video, VideoDraft,
    VideoSummary,
};
use dialoguer::{Confirm, Password};
use services::admin::{SEARCH_DEBOUNCE, debounce};
use services::{AppServices, DeleteRequest, Portal};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::ArgsError;
use crate::cli::{
    ConsentCommand, DeleteArgs, LoginArgs, RegisterArgs, UserFields, UsersCommand,
    VideosCommand,
};

type CommandResult = Result<(), Box<dyn Error>>;

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// Restore the stored session or fail with a hint to sign in.
pub async fn require_session(services: &AppServices) -> Result<User, Box<dyn Error>> {
    match services.auth().resume().await? {
        Some(user) => Ok(user),
        None => Err(ArgsError::NotSignedIn.into()),
    }
}

fn prompt_password(confirm: bool) -> Result<String, dialoguer::Error> {
    let prompt = Password::new().with_prompt("Password");
    if confirm {
        prompt
            .with_confirmation("Repeat password", "Passwords do not match")
            .interact()
    } else {
        prompt.interact()
    }
}

pub async fn login(services: &AppServices, args: LoginArgs) -> CommandResult {
    let password = match args.password {
        Some(password) => password,
        None => prompt_password(false)?,
    };
    let portal = if args.admin {
        Portal::Admin
    } else {
        Portal::Driver
    };
    let user = services.auth().login(&args.email, &password, portal).await?;
    println!("Signed in as {} <{}> ({})", user.full_name(), user.email, user.role.as_str());
    Ok(())
}

pub async fn logout(services: &AppServices) -> CommandResult {
    services.session().restore().await?;
    services.auth().logout().await;
    println!("Signed out.");
    Ok(())
}

pub async fn whoami(services: &AppServices) -> CommandResult {
    let user = require_session(services).await?;
    print_user(&user);
    if let Some(started_at) = services.session().started_at() {
        println!("  session since {}", started_at.format("%Y-%m-%d %H:%M UTC"));
    }
    Ok(())
}

pub async fn register(services: &AppServices, args: RegisterArgs) -> CommandResult {
    let registration = Registration {
        first_name: args.first_name,
        last_name: args.last_name,
        email: args.email,
        phone: args.phone,
        password: prompt_password(true)?,
    };
    let user = services.auth().register(&registration).await?;
    println!(
        "Created driver account #{} for {}. Sign in with `chauffeur login --email {}`.",
        user.id,
        user.full_name(),
        user.email
    );
    Ok(())
}

//
// ─── ADMIN ─────────────────────────────────────────────────────────────────────
//

fn confirm_delete<Id: Copy + std::fmt::Display>(
    request: DeleteRequest<Id>,
    args: &DeleteArgs,
) -> Result<Option<services::ConfirmedDelete<Id>>, dialoguer::Error> {
    if args.yes {
        return Ok(Some(request.confirm()));
    }
    let confirmed = Confirm::new()
        .with_prompt(request.prompt())
        .default(false)
        .interact()?;
    Ok(confirmed.then(|| request.confirm()))
}

/// Forward stdin lines through the search debounce.
fn search_terms() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if tx.send(line).await.is_err() {
                break;
            }
        }
    });
    debounce(rx, SEARCH_DEBOUNCE)
}

fn print_user(user: &User) {
    println!(
        "#{:<5} {:<28} {:<32} {:<6} exam {}",
        user.id,
        user.full_name(),
        user.email,
        user.role.as_str(),
        if user.is_exam_completed { "done" } else { "open" }
    );
}

fn print_user_page(page: &Page<User>) {
    if page.is_empty() {
        println!("No users found.");
    }
    for user in &page.data {
        print_user(user);
    }
    println!("page {}/{}", page.current_page, page.total_pages.max(1));
}

fn apply_user_fields(draft: &mut UserDraft, fields: UserFields) -> Result<(), dialoguer::Error> {
    if let Some(first_name) = fields.first_name {
        draft.first_name = first_name;
    }
    if let Some(last_name) = fields.last_name {
        draft.last_name = last_name;
    }
    if let Some(email) = fields.email {
        draft.email = email;
    }
    if let Some(phone) = fields.phone {
        draft.phone = (!phone.trim().is_empty()).then_some(phone);
    }
    if let Some(role) = fields.role {
        draft.role = role.into();
    }
    if fields.set_password {
        draft.password = Some(prompt_password(true)?);
    }
    Ok(())
}

pub async fn users(services: &AppServices, command: UsersCommand) -> CommandResult {
    require_session(services).await?;
    let admin = services.users();

    match command {
        UsersCommand::List(args) => {
            print_user_page(&admin.list(&args.request()).await?);
        }
        UsersCommand::Search(args) => {
            let mut terms = search_terms();
            while let Some(term) = terms.recv().await {
                println!("search: {term}");
                print_user_page(&admin.list(&args.request().with_search(term)).await?);
            }
        }
        UsersCommand::Show { id } => {
            let user = admin.detail(id).await?;
            print_user(&user);
            if let Some(phone) = &user.phone {
                println!("  phone {phone}");
            }
        }
        UsersCommand::Create(fields) => {
            let required = [
                (fields.first_name.is_none(), "--first-name"),
                (fields.last_name.is_none(), "--last-name"),
                (fields.email.is_none(), "--email"),
            ];
            if let Some((_, flag)) = required.into_iter().find(|(missing, _)| *missing) {
                return Err(ArgsError::MissingValue { flag }.into());
            }
            let mut draft = UserDraft {
                password: Some(prompt_password(true)?),
                ..UserDraft::default()
            };
            apply_user_fields(
                &mut draft,
                UserFields {
                    set_password: false,
                    ..fields
                },
            )?;
            let user = admin.create(&draft).await?;
            println!("Created user #{}.", user.id);
        }
        UsersCommand::Edit { id, fields } => {
            let (_, mut draft) = admin.edit(id).await?;
            apply_user_fields(&mut draft, fields)?;
            let user = admin.update(id, &draft).await?;
            print_user(&user);
        }
        UsersCommand::Delete { id, confirm } => {
            let user = admin.detail(id).await?;
            match confirm_delete(admin.delete_request(&user), &confirm)? {
                Some(confirmed) => {
                    admin.delete(confirmed).await?;
                    println!("Deleted user #{id}.");
                }
                None => println!("Kept user #{id}."),
            }
        }
    }
    Ok(())
}

fn print_video_page(page: &Page<VideoSummary>) {
    if page.is_empty() {
        println!("No videos found.");
    }
    for video in &page.data {
        let order = video
            .video_order
            .map_or_else(|| "-".to_string(), |o| o.to_string());
        println!(
            "#{:<5} order {:<4} {:<40} {:>6.0}s",
            video.id, order, video.title, video.duration
        );
    }
    println!("page {}/{}", page.current_page, page.total_pages.max(1));
}

fn print_video(video: &Video) {
    println!("#{} {}", video.id, video.title);
    if let Some(description) = &video.description {
        println!("  {description}");
    }
    println!("  url      {}", video.video_url);
    println!("  duration {:.0}s", video.duration);
    for (index, question) in video.ordered_questions().into_iter().enumerate() {
        println!("  Q{} {}", index + 1, question.text);
        for option in &question.options {
            let mark = match option.is_correct {
                Some(true) => "*",
                _ => " ",
            };
            println!("     {mark} {}", option.text);
        }
    }
}

fn read_video_draft(path: &std::path::Path) -> Result<VideoDraft, Box<dyn Error>> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

pub async fn videos(services: &AppServices, command: VideosCommand) -> CommandResult {
    require_session(services).await?;
    let admin = services.videos();

    match command {
        VideosCommand::List(args) => {
            print_video_page(&admin.list(&args.request()).await?);
        }
        VideosCommand::Search(args) => {
            let mut terms = search_terms();
            while let Some(term) = terms.recv().await {
                println!("search: {term}");
                print_video_page(&admin.list(&args.request().with_search(term)).await?);
            }
        }
        VideosCommand::Show { id } => print_video(&admin.detail(id).await?),
        VideosCommand::Create { file } => {
            let video = admin.create(&read_video_draft(&file)?).await?;
            println!("Created video #{}.", video.id);
        }
        VideosCommand::Draft { id } => {
            let (_, draft) = admin.edit(id).await?;
            println!("{}", serde_json::to_string_pretty(&draft)?);
        }
        VideosCommand::Edit { id, file } => {
            // fail early if the video no longer exists
            admin.detail(id).await?;
            let video = admin.update(id, &read_video_draft(&file)?).await?;
            print_video(&video);
        }
        VideosCommand::Order { id, order } => {
            admin.set_order(id, order).await?;
            println!("Video #{id} moved to position {order}.");
        }
        VideosCommand::Delete { id, confirm } => {
            let video = admin.detail(id).await?;
            match confirm_delete(admin.delete_request(&video.summary()), &confirm)? {
                Some(confirmed) => {
                    admin.delete(confirmed).await?;
                    println!("Deleted video #{id}.");
                }
                None => println!("Kept video #{id}."),
            }
        }
    }
    Ok(())
}

//
// ─── CONSENT ───────────────────────────────────────────────────────────────────
//

fn print_consent(prefs: &ConsentPreferences) {
    println!(
        "necessary: on  analytics: {}  marketing: {}  (decided {})",
        on_off(prefs.analytics),
        on_off(prefs.marketing),
        prefs.decided_at.format("%Y-%m-%d")
    );
}

fn on_off(value: bool) -> &'static str {
    if value { "on" } else { "off" }
}

pub async fn consent(services: &AppServices, command: ConsentCommand) -> CommandResult {
    let consent = services.consent();
    let prefs = match command {
        ConsentCommand::Show => match consent.load().await? {
            Some(prefs) => prefs,
            None => {
                println!("No consent decision recorded yet.");
                return Ok(());
            }
        },
        ConsentCommand::AcceptAll => consent.accept_all().await?,
        ConsentCommand::NecessaryOnly => consent.necessary_only().await?,
        ConsentCommand::Set {
            analytics,
            marketing,
        } => consent.save(analytics, marketing).await?,
    };
    print_consent(&prefs);
    Ok(())
}

use notedesk::{
    client::{ArticleClient, ClientConfig, SubmitOutcome},
    content::{ArticleStatus, CurrentUser, Role, StatusAction},
};
use uuid::Uuid;

const DEFAULT_URL: &str = "http://localhost:3000";

fn print_usage_and_exit() -> ! {
    eprintln!("Usage: notedesk-ctl list [draft|published|archived]");
    eprintln!("       notedesk-ctl <publish|draft|unpublish|archive|delete> <id>");
    eprintln!();
    eprintln!("Environment: NOTEDESK_URL, NOTEDESK_USER (required), NOTEDESK_ROLE (admin|author)");
    std::process::exit(1);
}

fn fail(msg: impl std::fmt::Display) -> ! {
    eprintln!("❌ {msg}");
    std::process::exit(1);
}

#[tokio::main]
async fn main() {
    let mut args = std::env::args().skip(1); // 跳过程序名

    let command = args.next().unwrap_or_else(|| {
        eprintln!("Missing <command>");
        print_usage_and_exit();
    });
    let operand = args.next();

    if args.next().is_some() {
        eprintln!("Too many arguments provided.");
        print_usage_and_exit();
    }

    let user_id = std::env::var("NOTEDESK_USER").unwrap_or_else(|_| {
        eprintln!("NOTEDESK_USER not set");
        print_usage_and_exit();
    });
    let role = match std::env::var("NOTEDESK_ROLE") {
        Ok(role) => role.parse::<Role>().unwrap_or_else(|e| fail(e)),
        Err(_) => Role::Author,
    };
    let url = std::env::var("NOTEDESK_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());

    let client = ArticleClient::new(ClientConfig::new(url), &CurrentUser::new(user_id, role))
        .unwrap_or_else(|e| fail(e));

    match command.as_str() {
        "list" => {
            let status = operand.map(|s| s.parse::<ArticleStatus>().unwrap_or_else(|e| fail(e)));
            let articles = client.list(status).await.unwrap_or_else(|e| fail(e));
            for article in articles {
                println!(
                    "{}  {:<9}  {}  {}",
                    article.id,
                    article.status.as_str(),
                    article.created_at.format("%Y-%m-%d %H:%M"),
                    article.title
                );
            }
        }
        "delete" => {
            let id = parse_id(operand);
            match client.delete(id).await {
                Ok(SubmitOutcome::Redirect(_) | SubmitOutcome::Done) => {
                    println!("✅ Deleted {id}")
                }
                Err(e) => fail(e),
            }
        }
        action => {
            let action = action.parse::<StatusAction>().unwrap_or_else(|_| {
                eprintln!("Unknown command: {action}");
                print_usage_and_exit();
            });
            let id = parse_id(operand);
            let article = client
                .transition(id, action)
                .await
                .unwrap_or_else(|e| fail(e));
            println!("✅ {} is now {}", article.id, article.status);
        }
    }
}

fn parse_id(operand: Option<String>) -> Uuid {
    let id = operand.unwrap_or_else(|| {
        eprintln!("Missing <id>");
        print_usage_and_exit();
    });
    id.parse().unwrap_or_else(|e| fail(format!("invalid id `{id}`: {e}")))
}

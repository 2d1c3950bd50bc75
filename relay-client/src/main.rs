//! `relay` - command-line front end for the order lifecycle

use anyhow::Context;
use clap::{Parser, Subcommand};
use relay_client::notify::BroadcastNotifier;
use relay_client::{
    ClientConfig, CreateOrderRequest, ExploreQuery, NoticeLevel, Order, OrderDetail, OrderQuery,
    OrderRepository, OrderStatus, ProofFile, Role, Session, SessionUser,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about = "Peer-assisted purchasing orders from the terminal")]
struct Args {
    /// Backend base URL
    #[arg(long, env = "RELAY_API_URL", default_value = "http://localhost:5000")]
    api_url: String,

    /// Bearer token
    #[arg(long, env = "RELAY_TOKEN")]
    token: Option<String>,

    /// Id of the signed-in user
    #[arg(long, env = "RELAY_USER_ID")]
    user_id: String,

    #[arg(long, env = "RELAY_USER_NAME", default_value = "me")]
    user_name: String,

    /// buyer, card_holder or admin
    #[arg(long, env = "RELAY_ROLE", default_value = "buyer")]
    role: Role,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Orders you created
    Orders {
        #[arg(long)]
        status: Option<OrderStatus>,
    },
    /// Orders you accepted
    Accepted {
        #[arg(long)]
        status: Option<OrderStatus>,
    },
    /// Pending orders open for acceptance
    Explore {
        #[arg(long)]
        category: Option<String>,
    },
    /// Show one order and the actions available on it
    Show { order_id: String },
    /// Create an order
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        url: String,
        #[arg(long)]
        amount: f64,
        #[arg(long)]
        reward: f64,
        #[arg(long)]
        instructions: Option<String>,
    },
    Accept { order_id: String },
    /// Cancel an order (buyer) or your acceptance (card holder)
    Cancel {
        order_id: String,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Confirm you paid the card holder
    Pay { order_id: String },
    /// Upload proof of purchase
    Proof { order_id: String, file: PathBuf },
    /// Confirm the product arrived
    Deliver { order_id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    relay_client::logger::init_logger(&args.log_level, args.json_logs)?;

    let mut config = ClientConfig::from_env();
    config.base_url = args.api_url.clone();
    let user = SessionUser::new(&args.user_id, &args.user_name, args.role);
    let session = Session::new(user.clone(), args.token.clone().or(config.token.clone()));

    let notifier = BroadcastNotifier::new(config.notice_capacity);
    let printer = tokio::spawn(print_notices(notifier.subscribe()));

    let repository = relay_client::connect(&config, session, Arc::new(notifier.clone()))
        .context("failed to build HTTP client")?;
    drop(notifier);

    let result = run(&repository, &user, args.command).await;

    repository.shutdown().await?;
    let _ = printer.await;
    result
}

async fn run(repository: &OrderRepository, user: &SessionUser, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Orders { status } => {
            repository
                .fetch_orders(OrderQuery {
                    status,
                    ..OrderQuery::default()
                })
                .await;
            print_list(&repository.state().mine);
        }
        Command::Accepted { status } => {
            repository
                .fetch_accepted_orders(OrderQuery {
                    status,
                    ..OrderQuery::default()
                })
                .await;
            print_list(&repository.state().accepted);
        }
        Command::Explore { category } => {
            repository
                .fetch_available_orders(ExploreQuery {
                    category,
                    ..ExploreQuery::default()
                })
                .await;
            print_list(&repository.state().available);
        }
        Command::Show { order_id } => {
            let mut detail = OrderDetail::new(repository.clone(), user.clone(), order_id);
            detail.load().await?;
            print_detail(&detail);
        }
        Command::Create {
            name,
            url,
            amount,
            reward,
            instructions,
        } => {
            let mut request = CreateOrderRequest::new(name, url, amount, reward);
            request.instructions = instructions;
            let order = repository.create_order(request).await?;
            print_order(&order);
        }
        Command::Accept { order_id } => {
            let mut detail = OrderDetail::new(repository.clone(), user.clone(), order_id);
            detail.accept().await?;
            print_detail(&detail);
        }
        Command::Cancel { order_id, reason } => {
            let mut detail = OrderDetail::new(repository.clone(), user.clone(), order_id);
            detail.cancel(reason).await?;
            print_detail(&detail);
        }
        Command::Pay { order_id } => {
            let mut detail = OrderDetail::new(repository.clone(), user.clone(), order_id);
            detail.confirm_payment().await?;
            print_detail(&detail);
        }
        Command::Proof { order_id, file } => {
            let proof = ProofFile::from_path(&file)
                .await
                .with_context(|| format!("cannot use {} as proof", file.display()))?;
            let mut detail = OrderDetail::new(repository.clone(), user.clone(), order_id);
            detail.upload_proof(proof).await?;
            print_detail(&detail);
        }
        Command::Deliver { order_id } => {
            let mut detail = OrderDetail::new(repository.clone(), user.clone(), order_id);
            detail.confirm_delivery().await?;
            print_detail(&detail);
        }
    }
    Ok(())
}

async fn print_notices(mut notices: tokio::sync::broadcast::Receiver<relay_client::Notice>) {
    use tokio::sync::broadcast::error::RecvError;
    loop {
        match notices.recv().await {
            Ok(notice) => {
                let tag = match notice.level {
                    NoticeLevel::Success => "ok",
                    NoticeLevel::Error => "error",
                };
                eprintln!("[{tag}] {}: {}", notice.title, notice.description);
            }
            Err(RecvError::Lagged(skipped)) => {
                eprintln!("[warn] {skipped} notices dropped");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

fn print_list(orders: &[Order]) {
    if orders.is_empty() {
        println!("No orders.");
        return;
    }
    for order in orders {
        println!(
            "{}  {:<18} {:>10.2}  {}  ({})",
            order.id,
            order.status.as_str(),
            order.total(),
            order.product_name,
            order.status.describe()
        );
    }
}

fn print_order(order: &Order) {
    println!("Order      {}", order.id);
    println!("Product    {}", order.product_name);
    println!("URL        {}", order.product_url);
    println!("Status     {} ({})", order.status, order.status.describe());
    println!(
        "Amount     {:.2} + reward {:.2} = {:.2}",
        order.amount,
        order.reward,
        order.total()
    );
    let buyer = order.buyer.as_ref().map_or(order.buyer_id.as_str(), |b| b.name.as_str());
    println!("Buyer      {buyer}");
    if let Some(holder) = order
        .card_holder
        .as_ref()
        .map(|h| h.name.as_str())
        .or(order.card_holder_id.as_deref())
    {
        println!("Card holder {holder}");
    }
    if let Some(instructions) = &order.instructions {
        println!("Notes      {instructions}");
    }
    if let Some(proof) = &order.proof_url {
        println!("Proof      {proof}");
    }
    if let Some(reason) = &order.cancel_reason {
        println!("Reason     {reason}");
    }
    println!("Created    {}", order.created_at.to_rfc3339());
}

fn print_detail(detail: &OrderDetail) {
    let Some(order) = detail.order() else {
        println!("Order {} could not be loaded.", detail.order_id());
        return;
    };
    print_order(order);
    let actions: Vec<_> = detail
        .allowed_actions()
        .into_iter()
        .map(|a| a.as_str())
        .collect();
    if actions.is_empty() {
        println!("Actions    none");
    } else {
        println!("Actions    {}", actions.join(", "));
    }
}

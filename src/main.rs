use std::sync::Arc;

use teloxide::prelude::*;
use tracing::{error, info, warn};
use tracing_subscriber::prelude::*;

use digestbot::bot::blockchain::BlockchainClient;
use digestbot::bot::cache::MemoryCache;
use digestbot::bot::completion::COMPLETION_TIMEOUT;
use digestbot::bot::digest::DigestCatalog;
use digestbot::bot::search::{ResponsesSearch, SearchService};
use digestbot::bot::tasks::{TaskRegistry, Templater, load_tasks};
use digestbot::bot::whitelist::{FileWhitelist, WhitelistStore};
use digestbot::bot::{CommandRouter, CompletionEngine, Incoming, RuntimeSettings, Scheduler, TelegramClient};
use digestbot::config::Config;
use digestbot::openai::OpenAiClient;
use digestbot::telegram_log::ChatLogLayer;

struct BotState {
    router: CommandRouter,
}

#[tokio::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {e}");
            std::process::exit(1);
        }
    };

    let bot = Bot::new(&config.telegram_token);
    let telegram = Arc::new(TelegramClient::new(bot.clone()));

    // Setup logging
    let file_appender = tracing_appender::rolling::daily(&config.log_dir, "digestbot.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let registry = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        );

    if let Some(log_chat_id) = config.log_chat_id {
        registry.with(ChatLogLayer::new(telegram.clone(), log_chat_id)).init();
    } else {
        registry.init();
    }

    info!("🚀 Starting digestbot v{}", env!("CARGO_PKG_VERSION"));

    let sources = config.task_sources();
    let loaded = match load_tasks(&sources) {
        Ok(loaded) => loaded,
        Err(e) => {
            error!("❌ Failed to load tasks: {e}");
            std::process::exit(1);
        }
    };

    let mut runtime = config.runtime_config();
    if let Some(base_prompt) = loaded.base_prompt {
        runtime.base_prompt = base_prompt;
    }
    info!("⚙️ {}", runtime.describe().replace('\n', ", "));
    let settings = Arc::new(RuntimeSettings::new(runtime));

    let openai = Arc::new(OpenAiClient::new(config.openai_api_key.clone()).with_base_url(&config.openai_base_url));
    let cache_config = config.cache_config();
    let search = Arc::new(SearchService::new(
        Arc::new(ResponsesSearch::new(openai.clone(), settings.clone())),
        Arc::new(MemoryCache::new(cache_config)),
        cache_config,
    ));
    let engine = Arc::new(CompletionEngine::new(openai, search, settings.clone()));

    let registry = Arc::new(TaskRegistry::new(loaded.tasks));
    let templater = Arc::new(Templater::new(
        settings,
        config.exchange_api.clone(),
        config.chart_path.clone(),
        config.timezone,
    ));

    let whitelist = Arc::new(FileWhitelist::new(&config.whitelist_file));
    if let Some(chat) = config.chat_id
        && let Err(e) = whitelist.add(chat)
    {
        warn!("⚠️ Cannot add CHAT_ID {chat} to whitelist: {e}");
    }

    let scheduler = Arc::new(Scheduler::new(
        engine.clone(),
        templater.clone(),
        telegram.clone(),
        whitelist.clone(),
        config.chat_id,
        config.failure_policy(),
        config.timezone,
        COMPLETION_TIMEOUT,
    ));
    let (_handles, errors) = scheduler.schedule(&registry.snapshot());
    for e in errors {
        error!("❌ {e}");
    }

    let router = CommandRouter::new(
        engine,
        registry,
        DigestCatalog::new(),
        templater,
        whitelist,
        telegram.clone(),
        BlockchainClient::new(config.blockchain_api.clone()),
        COMPLETION_TIMEOUT,
    );

    if let Err(e) = telegram.set_commands(&router.menu()).await {
        warn!("⚠️ {e}");
    }
    let greeting = format!(
        "Digest bot v{}\n\n{}",
        env!("CARGO_PKG_VERSION"),
        router.commands_list()
    );
    let fan_out = scheduler.broadcast(&greeting).await;
    info!("👋 Startup message delivered to {} chat(s)", fan_out.delivered.len());

    let state = Arc::new(BotState { router });

    let handler = dptree::entry().branch(Update::filter_message().endpoint(handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

async fn handle_message(msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };

    let incoming = Incoming {
        chat_id: msg.chat.id.0,
        user_id: msg.from.as_ref().map(|u| u.id.0 as i64),
        text: text.to_string(),
    };
    if state.router.handle(&incoming).await {
        info!("📨 {} handled in {}", text.split_whitespace().next().unwrap_or(""), incoming.chat_id);
    }
    Ok(())
}

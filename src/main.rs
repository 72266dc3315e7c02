//! Parley - 终端对话入口
//!
//! 加载配置、初始化日志、创建引擎，从标准输入逐行读取并打印回复；退出时写入存档。
//! 用法：`parley [config.toml]`

use std::path::PathBuf;

use anyhow::Context;
use parley::{config::load_config, observability, ChatEngine, RoundKind};
use tokio::io::BufReader;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = load_config(config_path).context("Failed to load config")?;
    observability::init(config.app.debug);

    let save_path = config.app.save_path.clone().unwrap_or_else(|| {
        PathBuf::from(format!(
            "./saves/{}-{}.json",
            config.app.name,
            chrono::Local::now().format("%Y%m%d-%H%M%S")
        ))
    });

    let mut engine = ChatEngine::from_config(config).context("Failed to create chat engine")?;
    if save_path.exists() && engine.load_from(&save_path) {
        println!("(Restored {} rounds from {})", engine.session().round(), save_path.display());
    }

    println!(r"(Type '\syntax' for commands, '\quit' to exit)");
    let stdin = BufReader::new(tokio::io::stdin());
    engine
        .run_loop(stdin, |outcome| match &outcome.kind {
            RoundKind::Terminated | RoundKind::Ignored => {}
            _ => println!("\nAssistant: {}\n", outcome.reply),
        })
        .await
        .context("Chat loop failed")?;

    engine.save_to(&save_path).context("Failed to save session")?;
    println!("(Session saved to {})", save_path.display());
    Ok(())
}

use anyhow::Result;
use async_trait::async_trait;

use super::Command;
use crate::bot::AppState;
use crate::dispatch::Reply;
use crate::platform::IncomingMessage;

const LINE_LENGTH: usize = 25;

/// 查功能: every command keyword, numbered and packed into short lines
pub struct Features;

#[async_trait]
impl Command for Features {
    async fn run(&self, state: &AppState, _msg: &IncomingMessage, _args: &str) -> Result<Reply> {
        Ok(Some(feature_list(&state.keywords)))
    }
}

fn feature_list(keywords: &[&str]) -> String {
    let mut output = String::new();
    let mut line = String::new();
    for (i, keyword) in keywords.iter().enumerate() {
        let item = format!("{}. {}", i + 1, keyword);
        if line.chars().count() + item.chars().count() < LINE_LENGTH {
            line.push_str(&item);
            line.push_str("  ");
        } else {
            output.push_str(line.trim());
            output.push('\n');
            line = format!("{}  ", item);
        }
    }
    output.push_str(line.trim());
    output
}

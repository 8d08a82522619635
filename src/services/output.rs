use crate::domain::models::{ErrorBody, JsonErr, JsonOut};
use serde::Serialize;

pub fn print_json<T: Serialize>(ok: bool, data: T) -> anyhow::Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(&JsonOut { ok, data })?
    );
    Ok(())
}

pub fn print_error(code: &str, message: &str) {
    let body = JsonErr {
        ok: false,
        error: ErrorBody {
            code: code.to_string(),
            message: message.to_string(),
        },
    };
    match serde_json::to_string_pretty(&body) {
        Ok(s) => println!("{}", s),
        Err(_) => println!("{{\"ok\":false}}"),
    }
}

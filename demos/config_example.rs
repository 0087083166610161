/*
 * Copyright Stalwart Labs Ltd. See the COPYING
 * file at the top-level directory of this distribution.
 *
 * Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
 * https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
 * <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
 * option. This file may not be copied, modified, or distributed
 * except according to those terms.
 */

use std::env;

use mail_courier::{ConfigLoader, Email, EmailSender};

#[tokio::main]
async fn main() {
    env_logger::init();

    // Environment variables first, then `.env`, then the file given as the
    // first argument (JSON, INI or .env, detected from its extension).
    let mut loader = ConfigLoader::new().dotenv(".env");
    if let Some(path) = env::args().nth(1) {
        loader = loader.file(path).unwrap();
    }

    let config = loader.load().unwrap();
    if !config.has_credentials() {
        eprintln!("Set EMAIL_ADDRESS and EMAIL_PASSWORD or pass a configuration file.");
        return;
    }
    println!("Loaded configuration: {config:?}");

    let sender = EmailSender::from_config(&config).unwrap();
    let email = Email::new(
        sender.email(),
        "Configuration test",
        "Your mail-courier configuration works.",
    );
    if sender.send_email(&email).await {
        println!("Email sent successfully!");
    }
}

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

use mail_courier::{Email, EmailSender};

#[tokio::main]
async fn main() {
    env_logger::init();

    // Use an app-specific password for Gmail accounts with 2FA enabled.
    let sender = EmailSender::new("john@example.com", "p4ssw0rd");

    // Plain text message to a single recipient
    let email = Email::new(
        "jane@example.com",
        "Test Email",
        "This is a test email sent from mail-courier.",
    );
    if sender.send_email(&email).await {
        println!("Plain text email sent successfully!");
    }

    // HTML message with CC and BCC recipients and an attachment
    let email = Email::new(
        ["jane@example.com", "james@test.com"],
        "Monthly report",
        "<h1>Monthly report</h1><p>Please find the report attached.</p>",
    )
    .cc("manager@example.com")
    .bcc("archive@example.com")
    .attach_file("report.pdf");

    if sender.send_html_email(&email).await {
        println!("HTML email sent successfully!");
    }
}

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

use std::collections::HashMap;

use mail_courier::{Email, EmailSender};

#[tokio::main]
async fn main() {
    env_logger::init();

    let sender = EmailSender::new("john@example.com", "p4ssw0rd");

    let template = "Hello {name},\n\n\
                    Thank you for your order #{order_number}.\n\
                    Your total is ${total}.\n\n\
                    Best regards,\n\
                    {company}";

    let vars = HashMap::from([
        ("name", "Jane Doe"),
        ("order_number", "ORD-12345"),
        ("total", "99.99"),
        ("company", "Example Store"),
    ]);

    let email = Email::new("customer@example.com", "Your Order Confirmation", template);
    if sender.send_template_email(&email, &vars).await {
        println!("Template email sent successfully!");
    }
}

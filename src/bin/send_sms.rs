// ABOUTME: One-shot SMS sender over the trait-based client API
// ABOUTME: Connects, binds as transmitter, sends one message, then unbinds

use smpp::client::{ClientBuilder, SmppClient, SmppConnection, SmppTransmitter, SmsMessage};
use std::env;
use std::error::Error;

fn usage() -> ! {
    eprintln!("usage: send_sms <host:port> <system_id> <password> <to> <from> <message>");
    std::process::exit(1);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = env::args().skip(1).collect();
    let [addr, system_id, password, to, from, message] = args.as_slice() else {
        usage();
    };

    let mut client =
        ClientBuilder::quick_transmitter(addr.as_str(), system_id.as_str(), password.as_str())
            .await?;

    let sms = SmsMessage::new(to.as_str(), from.as_str(), message.as_str());
    let message_id = client.send_sms(&sms).await?;
    println!("message sent with id: {message_id}");

    client.unbind().await?;
    client.disconnect().await?;
    Ok(())
}

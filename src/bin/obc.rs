use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use colored::*;
use serde_json::Value;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: &str = "8080";
const DELIMITER: u8 = b'!';
const REPLY_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_REPLY_LEN: usize = 1024;

fn axis_arg() -> Arg<'static, 'static> {
    Arg::with_name("axis")
        .help("Wheel axis")
        .required(true)
        .possible_values(&["x", "y", "z"])
}

fn triple_arg(help: &'static str) -> Arg<'static, 'static> {
    Arg::with_name("values")
        .help(help)
        .number_of_values(3)
        .allow_hyphen_values(true)
        .multiple(true)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = App::new("obc")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Space Systems Engineering Team")
        .about("OBC simulator - sends commands to the ADCS emulator")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("host")
                .short("h")
                .long("host")
                .value_name("HOST")
                .help("Emulator host address")
                .takes_value(true)
                .default_value(DEFAULT_HOST)
                .global(true),
        )
        .arg(
            Arg::with_name("port")
                .short("p")
                .long("port")
                .value_name("PORT")
                .help("Emulator port")
                .takes_value(true)
                .default_value(DEFAULT_PORT)
                .global(true),
        )
        .arg(
            Arg::with_name("format")
                .short("f")
                .long("format")
                .value_name("FORMAT")
                .help("Output format")
                .takes_value(true)
                .possible_values(&["json", "table"])
                .default_value("table")
                .global(true),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .help("Show the raw command sent")
                .global(true),
        )
        .subcommand(
            SubCommand::with_name("send")
                .about("Send a raw command body (delimiter appended if missing)")
                .arg(Arg::with_name("body").required(true)),
        )
        .subcommand(SubCommand::with_name("fw-version").about("Read the firmware version"))
        .subcommand(SubCommand::with_name("hw-version").about("Read the hardware version"))
        .subcommand(
            SubCommand::with_name("pwm")
                .about("Read or write a reaction wheel pulse width")
                .arg(axis_arg())
                .arg(Arg::with_name("value").help("New pulse width")),
        )
        .subcommand(
            SubCommand::with_name("dir")
                .about("Read or write a reaction wheel direction")
                .arg(axis_arg())
                .arg(Arg::with_name("direction").possible_values(&["clock", "antiClock"])),
        )
        .subcommand(
            SubCommand::with_name("rw-speed")
                .about("Read or write all three wheel speeds (rpm)")
                .arg(triple_arg("x y z speeds")),
        )
        .subcommand(SubCommand::with_name("rw-current").about("Read the wheel currents"))
        .subcommand(
            SubCommand::with_name("mqtr")
                .about("Read or write magnetorquer coil voltages (mV)")
                .arg(triple_arg("x y z millivolts")),
        )
        .subcommand(
            SubCommand::with_name("sun")
                .about("Read or reset the sun sensors")
                .arg(Arg::with_name("reset").long("reset").help("Reset instead of reading")),
        )
        .subcommand(
            SubCommand::with_name("mag")
                .about("Read or reset the magnetometer")
                .arg(Arg::with_name("reset").long("reset").help("Reset instead of reading")),
        )
        .subcommand(SubCommand::with_name("imu").about("Read the IMU"))
        .subcommand(SubCommand::with_name("current").about("Read the board current"))
        .subcommand(
            SubCommand::with_name("power-mode")
                .about("Read or write the power mode")
                .arg(Arg::with_name("mode").possible_values(&["nominal", "lowPower", "sleep"])),
        )
        .get_matches();

    let host = matches.value_of("host").unwrap_or(DEFAULT_HOST);
    let port: u16 = matches.value_of("port").unwrap_or(DEFAULT_PORT).parse()?;
    let format = matches.value_of("format").unwrap_or("table");

    let body = match build_command(&matches) {
        Some(body) => body,
        None => {
            eprintln!("{} Unknown command", "❌".red());
            std::process::exit(2);
        }
    };

    if matches.is_present("verbose") {
        println!("{} {}", "→".bright_blue(), body.bright_white());
    }

    let reply = send_command(host, port, &body).await?;
    print_reply(&reply, format);
    Ok(())
}

fn read_or_write(key: &str, value: Option<String>) -> String {
    match value {
        Some(value) => format!(r#"{{"{key}":"write","value":{value}}}"#),
        None => format!(r#"{{"{key}":"read"}}"#),
    }
}

fn read_or_reset(key: &str, reset: bool) -> String {
    let verb = if reset { "reset" } else { "read" };
    format!(r#"{{"{key}":"{verb}"}}"#)
}

fn triple(args: &ArgMatches<'_>) -> Option<String> {
    args.values_of("values")
        .map(|values| format!("[{}]", values.collect::<Vec<_>>().join(",")))
}

fn build_command(matches: &ArgMatches<'_>) -> Option<String> {
    let body = match matches.subcommand() {
        ("send", Some(args)) => args.value_of("body")?.trim_end_matches('!').to_string(),
        ("fw-version", _) => read_or_write("fwVersion", None),
        ("hw-version", _) => read_or_write("hwVersion", None),
        ("pwm", Some(args)) => {
            let key = format!("pwm_rw_{}", args.value_of("axis")?);
            read_or_write(&key, args.value_of("value").map(str::to_string))
        }
        ("dir", Some(args)) => {
            let key = format!("dir_rw_{}", args.value_of("axis")?);
            read_or_write(&key, args.value_of("direction").map(|d| format!("\"{d}\"")))
        }
        ("rw-speed", Some(args)) => read_or_write("rw_speed", triple(args)),
        ("rw-current", _) => read_or_write("rw_current", None),
        ("mqtr", Some(args)) => read_or_write("mqtr_volts", triple(args)),
        ("sun", Some(args)) => read_or_reset("sunSen", args.is_present("reset")),
        ("mag", Some(args)) => read_or_reset("magSen", args.is_present("reset")),
        ("imu", _) => read_or_write("imu", None),
        ("current", _) => read_or_write("current", None),
        ("power-mode", Some(args)) => {
            read_or_write("powerMode", args.value_of("mode").map(|m| format!("\"{m}\"")))
        }
        _ => return None,
    };
    Some(body)
}

async fn send_command(
    host: &str,
    port: u16,
    body: &str,
) -> Result<String, Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", host, port);
    let mut stream = match TcpStream::connect(&addr).await {
        Ok(stream) => stream,
        Err(e) => {
            eprintln!(
                "{} Failed to connect to ADCS emulator at {}",
                "❌".red(),
                addr.bright_white()
            );
            if e.kind() == std::io::ErrorKind::ConnectionRefused {
                eprintln!("{} Start it with:", "💡".yellow());
                eprintln!("   {}", "adcs-emulator --transport tcp".bright_cyan());
            }
            return Err(e.into());
        }
    };

    let reply = tokio::time::timeout(REPLY_TIMEOUT, async {
        stream.write_all(body.as_bytes()).await?;
        stream.write_all(&[DELIMITER]).await?;

        // Replies are delimiter-terminated, not newline-terminated
        let mut reply = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            if stream.read(&mut byte).await? == 0 {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "Emulator closed connection",
                ));
            }
            if byte[0] == DELIMITER {
                break;
            }
            reply.push(byte[0]);
            if reply.len() > MAX_REPLY_LEN {
                return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "Reply too long"));
            }
        }
        Ok::<String, std::io::Error>(String::from_utf8_lossy(&reply).into_owned())
    })
    .await;

    match reply {
        Ok(Ok(reply)) => Ok(reply),
        Ok(Err(e)) => {
            eprintln!("{} {}", "❌".red(), e.to_string().bright_red());
            Err(e.into())
        }
        Err(_) => {
            eprintln!("{} No reply within {:?}", "⏰".yellow(), REPLY_TIMEOUT);
            Err("reply timeout".into())
        }
    }
}

fn print_reply(reply: &str, format: &str) {
    if format == "json" {
        println!("{}", reply);
        return;
    }

    let value: Value = match serde_json::from_str(reply) {
        Ok(value) => value,
        Err(_) => {
            println!("{}", reply.yellow());
            return;
        }
    };

    let Some(object) = value.as_object() else {
        println!("{}", reply);
        return;
    };

    for (key, value) in object {
        if key == "error" || key == "ADCS" {
            println!("{} {}", "❌".red(), value.as_str().unwrap_or_default().bright_red());
            continue;
        }

        match value {
            Value::Object(fields) => {
                println!("{}", key.bright_cyan().bold());
                for (field, inner) in fields {
                    println!("  {:<8} {}", field.bright_white(), inner.to_string().green());
                }
            }
            Value::String(s) => println!("{:<12} {}", key.bright_cyan(), s.green()),
            other => println!("{:<12} {}", key.bright_cyan(), other.to_string().green()),
        }
    }
}

use confclient::code::{self, Severity};
use confclient::config::{ClientConfig, OutputConfig};
use confclient::errors::{ClientError, ClientResult};
use confclient::session::{CommandReply, Session};
use confclient::xml::{Document, ElemId};

use crossterm::style::Stylize;
use jiff::Timestamp;
use serde::Serialize;
use std::io::Write;
use std::net::Ipv4Addr;

fn main() {
    let mut config_path = "confclient.conf".to_string();
    let mut json_flag: Option<bool> = None;
    let mut colors_flag: Option<bool> = None;
    let mut timestamps_flag: Option<bool> = None;
    let mut command_words: Vec<String> = Vec::new();

    let mut args = std::env::args().skip(1);
    loop {
        let Some(arg) = args.next() else { break };
        match arg.as_str() {
            "--json" => json_flag = Some(true),
            "--no-color" => colors_flag = Some(false),
            "--timestamps" | "-t" => timestamps_flag = Some(true),
            "--config" => {
                let Some(path) = args.next() else {
                    eprintln!("--config requires a file path");
                    std::process::exit(2);
                };
                config_path = path;
            }
            "--help" | "-h" => {
                print_usage();
                return;
            }
            _ => {
                // everything from here on is the command to run
                command_words.push(arg);
                command_words.extend(&mut args);
                break;
            }
        }
    }

    // Load configuration
    let mut config = match ClientConfig::load_from_file(&config_path) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Config error: {}. Using defaults.", err);
            ClientConfig::default()
        }
    };

    if let Some(json) = json_flag {
        config.output.json = json;
    }
    if let Some(colors) = colors_flag {
        config.output.use_colors = colors;
    }
    if let Some(timestamps) = timestamps_flag {
        config.output.timestamps = timestamps;
    }

    let command = if command_words.is_empty() {
        None
    } else {
        Some(command_words.join(" "))
    };

    if let Err(err) = run(&config, command.as_deref()) {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}

fn print_usage() {
    println!("Usage: confclient [OPTIONS] [COMMAND...]");
    println!();
    println!("Runs COMMAND on the device, or an interactive prompt when no");
    println!("command is given. Connection settings come from the config file.");
    println!();
    println!("Options:");
    println!("  --config <path>   Config file (default: confclient.conf)");
    println!("  --json            Print replies as JSON documents");
    println!("  --timestamps, -t  Prefix replies with a wall-clock timestamp");
    println!("  --no-color        Disable colored output");
    println!("  --help, -h        Show this help");
}

fn run(config: &ClientConfig, command: Option<&str>) -> ClientResult<()> {
    let address: Ipv4Addr = config
        .device
        .address
        .parse()
        .map_err(|_| ClientError::Address)?;

    if !config.output.json {
        println!(
            "Connecting to {}:{} as '{}' ...",
            config.device.address, config.device.port, config.auth.user
        );
    }

    let mut session = Session::open(
        address,
        config.device.port,
        &config.auth.user,
        &config.auth.password,
        config.timeouts.open,
    )?;

    if !config.output.json {
        println!("Raw mode session established");
    }

    let result = match command {
        Some(command) => execute(&mut session, command, config),
        None => repl(&mut session, config),
    };

    session.close();
    result
}

fn repl(session: &mut Session, config: &ClientConfig) -> ClientResult<()> {
    let stdin = std::io::stdin();

    loop {
        print!("> ");
        let _ = std::io::stdout().flush();

        let mut line = String::new();
        match stdin.read_line(&mut line) {
            Ok(0) => break, // EOF
            Ok(_) => {}
            Err(err) => return Err(ClientError::Io(err)),
        }

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" || line == "quit" {
            break;
        }

        execute(session, line, config)?;
    }

    Ok(())
}

/// Send one command and print every reply document it produces.
fn execute(session: &mut Session, command: &str, config: &ClientConfig) -> ClientResult<()> {
    session.send(command, config.timeouts.send)?;

    loop {
        let reply = session.recv(config.timeouts.recv)?;
        render_reply(&reply, &config.output);
        if !reply.continued {
            break;
        }
    }

    Ok(())
}

#[derive(Serialize)]
struct JsonReply<'a> {
    timestamp: Timestamp,
    continued: bool,
    code: u32,
    severity: Severity,
    text: &'a str,
    response: serde_json::Value,
}

fn render_reply(reply: &CommandReply, output: &OutputConfig) {
    if output.json {
        let payload = JsonReply {
            timestamp: Timestamp::now(),
            continued: reply.continued,
            code: reply.code,
            severity: code::severity(reply.code),
            text: &reply.text,
            response: element_to_json(&reply.doc, reply.doc.root()),
        };
        match serde_json::to_string_pretty(&payload) {
            Ok(json) => println!("{}", json),
            Err(err) => eprintln!("Error: could not encode reply: {}", err),
        }
        return;
    }

    let severity = code::severity(reply.code);
    let is_event = reply.doc.name(reply.doc.root()) == "event";

    let mut line = String::new();
    if output.timestamps {
        line.push_str(&format!("[{}] ", Timestamp::now()));
    }

    let tag = if is_event {
        "[event]".to_string()
    } else {
        format!("[{}]", severity)
    };

    if output.use_colors {
        let colored = match severity {
            Severity::Info => tag.as_str().green(),
            Severity::Warning => tag.as_str().yellow(),
            Severity::Error => tag.as_str().red(),
            Severity::Critical => tag.as_str().dark_red(),
        };
        println!("{}{} {}", line, colored, reply.text);
    } else {
        println!("{}{} {}", line, tag, reply.text);
    }
}

/// Render an element subtree as JSON, preserving attribute and child
/// order with explicit arrays.
fn element_to_json(doc: &Document, id: ElemId) -> serde_json::Value {
    let attributes: Vec<serde_json::Value> = doc
        .attributes(id)
        .iter()
        .map(|attr| {
            serde_json::json!({
                "name": attr.name,
                "value": attr.value,
            })
        })
        .collect();

    let children: Vec<serde_json::Value> = doc
        .children(id)
        .iter()
        .map(|&child| element_to_json(doc, child))
        .collect();

    serde_json::json!({
        "name": doc.name(id),
        "value": doc.value(id),
        "attributes": attributes,
        "children": children,
    })
}

use anyhow::Context;
use clap::{App, Arg};
use flightvars_client::FlightVarsClient;
use flightvars_core::codec::VariableId;
use std::sync::Arc;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::try_init().map_err(|e| anyhow::anyhow!(e))?;

    let matches = App::new("flightvars-client")
        .version("0.1.0")
        .about("Watches a FlightVars variable and prints its updates")
        .arg(
            Arg::with_name("host")
                .short("H")
                .long("host")
                .takes_value(true)
                .default_value("127.0.0.1")
                .help("Server host"),
        )
        .arg(
            Arg::with_name("port")
                .short("p")
                .long("port")
                .takes_value(true)
                .default_value("8642")
                .help("Server port"),
        )
        .arg(
            Arg::with_name("variable")
                .required(true)
                .help("Variable to watch, as <group>/<name> (e.g. fsuipc/offset/0x1000:1)"),
        )
        .get_matches();

    let host = matches.value_of("host").unwrap_or("127.0.0.1");
    let port = matches.value_of("port").unwrap_or("8642");
    let variable = matches
        .value_of("variable")
        .context("missing variable argument")?;
    let sep = variable
        .rfind('/')
        .context("variable must be <group>/<name>")?;
    let var_id = VariableId::new(&variable[..sep], &variable[sep + 1..]);

    let client = FlightVarsClient::connect("FlightVars CLI", &format!("{}:{}", host, port))?;
    let subs_id = client.subscribe(
        &var_id,
        Arc::new(|var_id, value| println!("{} = {}", var_id, value)),
    )?;
    eprintln!("subscribed to {} as {}; press enter to exit", var_id, subs_id);

    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;

    client.close()?;
    Ok(())
}

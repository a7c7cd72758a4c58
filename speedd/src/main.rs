use clap::Parser;
use speedd::Server;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = common::DEFAULT_PORT)]
    port: u16,
}

fn main() -> std::io::Result<()> {
    env_logger::init();
    let args = Args::parse();
    let listener = common::get_tcp_listener(&args.host, args.port)?;
    Server::new().run(listener)
}

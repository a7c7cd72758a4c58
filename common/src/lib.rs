use std::io;
use std::net::TcpListener;

pub const BUFFER_SIZE: usize = 4096;
pub const DEFAULT_PORT: u16 = 8096;

pub fn get_tcp_listener(host: &str, port: u16) -> io::Result<TcpListener> {
    let listener = TcpListener::bind((host, port))?;
    log::info!(
        "listening for TCP connections on {}",
        listener.local_addr()?
    );
    Ok(listener)
}

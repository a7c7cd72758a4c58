use std::net::{TcpListener, TcpStream};

pub fn listen_on_available_port() -> (TcpListener, u16) {
    let listener =
        TcpListener::bind(("127.0.0.1", 0)).expect("Could not bind to an ephemeral port.");
    let port = listener
        .local_addr()
        .expect("Could not read bound address.")
        .port();
    (listener, port)
}

pub fn connect(port: u16) -> TcpStream {
    TcpStream::connect(("127.0.0.1", port)).expect("Could not connect to integration server.")
}

pub fn u8s_to_hex_str(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn hex_str_to_u8s(hex: &str) -> Result<Vec<u8>, ()> {
    let stripped = hex
        .chars()
        .filter(char::is_ascii_hexdigit)
        .collect::<Vec<char>>();
    if stripped.len() % 2 != 0 {
        return Err(());
    }
    stripped
        .chunks(2)
        .map(|double_hex| double_hex.iter().collect::<String>())
        .map(|hex_string| u8::from_str_radix(&hex_string, 16).map_err(|_| ()))
        .collect::<Result<Vec<_>, ()>>()
}

#[macro_export]
macro_rules! send_bytes_from {
    ($s:expr, $h:expr) => {{
        use std::io::Write;
        _ = $s.write_all(
            &$crate::hex_str_to_u8s($h).expect("Invalid hex code provided for integration test."),
        );
    }};
}

#[macro_export]
macro_rules! assert_client_receives_bytes (
    ($s:expr, $h:expr, $d:expr) => {{
        use std::io::Read;

        let client = &mut $s;
        let bytes = $crate::hex_str_to_u8s($h).expect("Invalid hex code provided for integration test.");
        let mut buffer: Vec<u8> = Vec::new();
        client.set_read_timeout(Some($d)).expect("Could not set read timeout.");
        match client.take(bytes.len() as u64).read_to_end(&mut buffer) {
            Err(e)  => panic!("Client connection errored: {e:?}"),
            Ok(_) => assert_eq!(
                $crate::u8s_to_hex_str(&bytes),
                $crate::u8s_to_hex_str(&buffer),
            ),
        };
        client.set_read_timeout(None).expect("Could not unset read timeout.");
    }};
    ($s:expr, $h:expr) => {{
        use std::time::Duration;
        $crate::assert_client_receives_bytes!($s, $h, Duration::from_secs(1));
    }};
);

#[macro_export]
macro_rules! assert_client_not_receives_bytes (
    ($s:expr, $h:expr, $d:expr) => {{
        use std::io::Read;

        let client = &mut $s;
        let bytes = $crate::hex_str_to_u8s($h).expect("Invalid hex code provided for integration test.");
        let mut buffer = vec![0u8; bytes.len().max(1)];
        client.set_read_timeout(Some($d)).expect("Could not set read timeout.");
        match client.read(&mut buffer) {
            // Nothing arrived before the deadline, or the peer closed cleanly.
            Err(_) | Ok(0) => (),
            Ok(n) => assert_ne!(
                $crate::u8s_to_hex_str(&bytes),
                $crate::u8s_to_hex_str(&buffer[..n]),
                "client unexpectedly received bytes",
            ),
        };
        client.set_read_timeout(None).expect("Could not unset read timeout.");
    }};
);

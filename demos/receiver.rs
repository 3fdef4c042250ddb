use dmxp_streamer::config::{BLOCK_SIZE, DESTINATION_PORT};
use std::env;
use std::net::{Ipv6Addr, UdpSocket};

fn main() -> std::io::Result<()> {
    let args: Vec<String> = env::args().collect();
    let expected: Option<usize> = args.get(1).and_then(|s| s.parse().ok());

    let socket = UdpSocket::bind((Ipv6Addr::UNSPECIFIED, DESTINATION_PORT))?;
    println!("Receiver: listening on {}", socket.local_addr()?);

    // One byte of headroom so an oversized datagram shows up as such
    let mut buf = vec![0u8; BLOCK_SIZE + 1];
    let mut received = 0usize;
    let start = std::time::Instant::now();

    println!("\n{:<10} {:<10} {}", "Block #", "Bytes", "Marker");
    println!("{}", "=".repeat(40));

    while expected.map_or(true, |n| received < n) {
        let (len, from) = socket.recv_from(&mut buf)?;
        received += 1;
        let marker = buf.first().copied().unwrap_or_default();
        if len == BLOCK_SIZE {
            println!("{:<10} {:<10} {}", received, len, marker);
        } else {
            println!("{:<10} {:<10} {} (unexpected size from {})", received, len, marker, from);
        }
    }

    let elapsed = start.elapsed();
    println!("\n{}", "=".repeat(40));
    println!("Receiver: {} blocks in {:.2?}", received, elapsed);
    println!(
        "Average: {:.2} MB/s",
        (received * BLOCK_SIZE) as f64 / elapsed.as_secs_f64() / 1_000_000.0
    );

    Ok(())
}

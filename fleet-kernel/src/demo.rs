//! Deterministic demo fleet seeded at boot when `demo.servers > 0`.

use crate::models::InventoryRow;

const OWNERS: u64 = 5;
const APPLICATIONS: u64 = 10;
const WAVES: u64 = 5;

// splitmix64 finaliser: a well-spread 64-bit hash of `seed`.
fn mix(seed: u64) -> u64 {
    let mut z = seed.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

pub fn demo_rows(count: usize) -> Vec<InventoryRow> {
    (1..=count as u64)
        .map(|i| {
            let r = mix(i);
            let online = r % 2 == 0;
            let pingable = online && (r >> 8) % 10 < 8;
            InventoryRow {
                owner: Some(format!("Owner{}", (r >> 16) % OWNERS + 1)),
                application: Some(format!("App{}", (r >> 24) % APPLICATIONS + 1)),
                server: Some(format!("server{i}")),
                status: Some(if online { "online" } else { "offline" }.into()),
                shutdown_sequence: Some(((r >> 32) % WAVES).to_string()),
                pingable: Some(if pingable { "yes" } else { "no" }.into()),
            }
        })
        .collect()
}

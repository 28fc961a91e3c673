use rand::Rng;
use ringkv::storage::{DiskStore, MemoryStore, SledStore};
use ringkv::{KvError, ReplicationClient, ReplicationMode, RingKvConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Reading {
    sensor: String,
    value: f64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("ringkv - Replicated Key/Value Facade");
    println!("====================================");

    let config = RingKvConfig::from_env();
    info!("Replication factor: {}", config.replication_factor);
    info!("Replication mode: {}", config.replication_mode);
    info!("Data dir: {}", config.data_dir);

    let client = ReplicationClient::with_config(&config);
    let data_dir = Path::new(&config.data_dir);

    client.add_node("memory", Arc::new(MemoryStore::new())).await?;
    let disk = DiskStore::new(data_dir.join("disk")).await?;
    client.add_node("disk", Arc::new(disk)).await?;
    let sled = SledStore::open(data_dir.join("sled"))?;
    client.add_node("sled", Arc::new(sled)).await?;
    println!("Nodes: {:?}", client.nodes().await);

    // At least two replicas so the demo survives losing a node
    let factor = config.replication_factor.max(2).min(client.node_count().await);
    client.set_replication_factor(factor).await?;

    println!(
        "\nWriting readings with {} replication to {} nodes...",
        client.replication_mode().await,
        client.replication_factor().await
    );
    let keys = write_readings(&client, 100).await?;

    println!("\nReading back...");
    read_readings(&client, &keys).await?;

    println!("\nRemoving node 'memory'...");
    client.remove_node("memory").await?;
    match client.set_value("after-removal", &0u8).await {
        Err(KvError::Unavailable { requested, available }) => {
            println!(
                "Writes need {} nodes but only {} remain, lowering factor",
                requested, available
            );
            client.set_replication_factor(available).await?;
        }
        other => other?,
    }
    read_readings(&client, &keys).await?;

    println!("\nSwitching to sync replication and deleting...");
    client.set_replication_mode(ReplicationMode::Sync).await;
    for key in &keys {
        client.del(key).await?;
    }
    let mut still_present = 0;
    for key in &keys {
        if client.get(key).await.is_ok() {
            still_present += 1;
        }
    }
    println!("  Deleted {} keys, {} still readable", keys.len(), still_present);

    println!("\nShutting down...");
    client.close().await?;

    println!("Demo completed successfully!");
    Ok(())
}

async fn write_readings(
    client: &ReplicationClient,
    count: usize,
) -> Result<Vec<String>, KvError> {
    let mut rng = rand::thread_rng();
    let sensors = ["cpu.usage", "memory.usage", "disk.io"];
    let mut keys = Vec::with_capacity(count);

    let start = Instant::now();
    for i in 0..count {
        let sensor = sensors[i % sensors.len()];
        let reading = Reading {
            sensor: sensor.to_string(),
            value: rng.gen_range(0.0..100.0),
        };
        let key = format!("{}.{}", sensor, i);
        client.set_value(&key, &reading).await?;
        keys.push(key);
    }
    client.wait_for_replication().await;
    println!("  Wrote {} readings in {:?}", count, start.elapsed());

    Ok(keys)
}

async fn read_readings(client: &ReplicationClient, keys: &[String]) -> Result<(), KvError> {
    let start = Instant::now();
    let mut found = 0;

    for key in keys {
        match client.get_value::<Reading, _>(key).await {
            Ok(_) => found += 1,
            Err(KvError::NotFound) => println!("  {} missing", key),
            Err(e) => return Err(e),
        }
    }

    println!(
        "  Found {}/{} readings in {:?} across {:?}",
        found,
        keys.len(),
        start.elapsed(),
        client.nodes().await
    );
    Ok(())
}

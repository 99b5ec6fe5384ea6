//! # Graphwire Node
//!
//! Runs a client and a server peer over an in-memory channel and walks
//! through the call shapes the protocol supports:
//!
//! 1. Typed async call returning a composite (`Fetch`)
//! 2. Fire-and-forget notification (`Log`)
//! 3. Blocking call from a worker thread
//! 4. Round trip of a cyclic object graph (`Echo`)
//! 5. Call to a method the server does not serve (abort → default)
//!
//! Finishes by printing the client's counters and the Prometheus text.

mod record;

use std::sync::Arc;

use anyhow::{ensure, Context, Result};
use tracing::info;

use graphwire::{
    HandlerError, MemoryChannel, MethodSignature, Peer, RpcConfig, RpcMetrics, Transmittable,
    TypeRegistry, TypeTree, Value,
};
use graphwire_telemetry::{encode_metrics, init_telemetry, observe_pending, PrometheusRecorder, TelemetryConfig};

use crate::record::{register_list_node, ring, Record};

fn fetch() -> MethodSignature {
    MethodSignature::new("Fetch")
        .param(TypeTree::i32())
        .returns(Record::type_tree())
}

fn log() -> MethodSignature {
    MethodSignature::new("Log").param(TypeTree::string())
}

fn echo() -> MethodSignature {
    MethodSignature::new("Echo")
        .param(TypeTree::new("ListNode"))
        .returns(TypeTree::new("ListNode"))
}

fn serve(server: &Peer) {
    server.register_fn(fetch(), |args| {
        let id = args
            .first()
            .and_then(Value::as_i32)
            .ok_or_else(|| HandlerError::new("Fetch expects an i32 id"))?;
        Ok(Record {
            id,
            name: format!("record-{id}"),
            tags: vec!["demo".to_string(), "graphwire".to_string()],
        }
        .to_value())
    });

    server.register_fn(log(), |args| {
        info!(line = args.first().and_then(graphwire::Value::as_str).unwrap_or_default(), "Remote log");
        Ok(Value::Null)
    });

    server.register_fn(echo(), |mut args| Ok(args.pop().unwrap_or_default()));
}

#[tokio::main]
async fn main() -> Result<()> {
    let _telemetry = init_telemetry(TelemetryConfig::for_node("node"))
        .context("Failed to initialize telemetry")?;
    let config = RpcConfig::from_env().context("Invalid Graphwire configuration")?;

    let types = Arc::new(TypeRegistry::new());
    Record::register(&types);
    register_list_node(&types);

    let (left, right) = MemoryChannel::named_pair("client", "server");
    let client = Arc::new(Peer::with_metrics(
        Arc::new(left),
        types.clone(),
        config.clone(),
        Arc::new(RpcMetrics::with_recorder(Arc::new(PrometheusRecorder))),
    )?);
    let server = Peer::new(Arc::new(right), types, config)?;
    serve(&server);
    client.spawn_cleanup()?;

    let record: Record = client.call_typed(&fetch(), &[Value::I32(42)]).await?;
    info!(id = record.id, name = %record.name, tags = ?record.tags, "Fetched record");
    ensure!(record.id == 42, "server returned the wrong record");

    client.notify(&log(), &[Value::from("hello from the client")])?;

    let blocking = {
        let client = client.clone();
        tokio::task::spawn_blocking(move || client.call_blocking(&fetch(), &[Value::I32(7)]))
    };
    let record = Record::from_value(blocking.await??)?;
    info!(id = record.id, "Fetched record from a blocking call");

    let head = client.call(&echo(), &[ring(3)]).await?;
    let node = head.as_object().context("Echo returned no object")?;
    let third = node
        .field("next")
        .and_then(|n| n.as_object().and_then(|o| o.field("next")))
        .context("ring lost a link")?;
    let back = third
        .as_object()
        .and_then(|o| o.field("next"))
        .context("ring lost a link")?;
    ensure!(back.same_handle(&head), "ring did not close on the far side");
    info!("Cyclic graph survived the round trip");

    let missing = MethodSignature::new("Missing").returns(TypeTree::i64());
    let value = client.call(&missing, &[]).await?;
    info!(value = ?value, "Unserved method returned the default");

    observe_pending(client.pending());
    println!(
        "{}",
        serde_json::to_string_pretty(&client.metrics().snapshot())?
    );
    println!("{}", encode_metrics()?);

    client.shutdown();
    server.shutdown();
    Ok(())
}

use async_trait::async_trait;
use netperf_harness::{
    CommandExecutor, CommandLine, HarnessConfig, NetperfResults, NetperfRunner, Result,
    RunRequest, TestType,
};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

const FLOWS: u8 = 16;
const SAMPLES_PER_FLOW: u8 = 25;

/// Emits interim markers whose timestamps are derived from the peer address,
/// so every flow contributes a disjoint set of timestamps.
struct PeerScriptedExecutor;

#[async_trait]
impl CommandExecutor for PeerScriptedExecutor {
    async fn execute(&self, command: &CommandLine, wait: bool) -> Result<Option<String>> {
        if !wait {
            return Ok(None);
        }
        let tokens = command.tokens();
        let peer_pos = tokens.iter().position(|t| t == "-H").expect("-H flag") + 1;
        let peer: Ipv4Addr = tokens[peer_pos].parse().expect("ipv4 peer");
        let flow = peer.octets()[3] as f64;

        // let other flows interleave with this one
        tokio::task::yield_now().await;

        let mut output = String::from("MIGRATED TCP STREAM TEST\n");
        for k in 0..SAMPLES_PER_FLOW {
            let timestamp = flow * 100.0 + k as f64 * 0.5;
            output.push_str(&format!(
                "NETPERF_INTERIM_RESULT[{}]={:.2}\nNETPERF_UNITS[{}]=10^6bits/s\nNETPERF_ENDING[{}]={:.3}\n",
                k,
                flow + k as f64,
                k,
                k,
                timestamp
            ));
        }
        Ok(Some(output))
    }
}

fn request(ns: &str, flow: u8) -> RunRequest {
    RunRequest::new(ns, IpAddr::V4(Ipv4Addr::new(10, 0, 1, flow)), TestType::TcpStream)
        .with_start_delay(Duration::from_millis((flow % 4) as u64 * 10))
}

fn runner() -> Arc<NetperfRunner<PeerScriptedExecutor>> {
    Arc::new(NetperfRunner::with_executor(
        &HarnessConfig::default(),
        PeerScriptedExecutor,
    ))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_flows_into_one_namespace_lose_no_samples() {
    let runner = runner();
    let store = NetperfResults::shared();

    let handles: Vec<_> = (1..=FLOWS)
        .map(|flow| {
            let runner = Arc::clone(&runner);
            let store = Arc::clone(&store);
            tokio::spawn(async move { runner.run_netperf(&request("red", flow), &store).await })
        })
        .collect();

    for handle in handles {
        let report = handle.await.unwrap().unwrap();
        assert_eq!(report.samples, SAMPLES_PER_FLOW as usize);
    }

    let results = store.lock();
    let series = results.series("red").unwrap();
    assert_eq!(series.len(), FLOWS as usize * SAMPLES_PER_FLOW as usize);
    for flow in 1..=FLOWS {
        for k in 0..SAMPLES_PER_FLOW {
            let timestamp = flow as f64 * 100.0 + k as f64 * 0.5;
            assert_eq!(series.get(timestamp), Some(flow as f64 + k as f64));
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_flows_into_many_namespaces_share_one_store() {
    let runner = runner();
    let store = NetperfResults::shared();

    let handles: Vec<_> = (1..=FLOWS)
        .map(|flow| {
            let runner = Arc::clone(&runner);
            let store = Arc::clone(&store);
            let ns = format!("ns{}", flow);
            tokio::spawn(async move { runner.run_netperf(&request(&ns, flow), &store).await })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let results = store.lock();
    assert_eq!(results.namespaces().count(), FLOWS as usize);
    for flow in 1..=FLOWS {
        let series = results.series(&format!("ns{}", flow)).unwrap();
        assert_eq!(series.len(), SAMPLES_PER_FLOW as usize);
    }
}

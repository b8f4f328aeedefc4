use std::time::{Duration, Instant};
use rand::{seq::SliceRandom, thread_rng};
use reqwest::Client;
use hdrhistogram::Histogram;
use std::collections::BTreeMap;
use serde_json::Value;


/// Groups a failed `/chat` reply under its status and `error` text.
fn failure_key(status: u16, body: Option<&Value>) -> String {
    let error = body
        .and_then(|b| b.get("error"))
        .and_then(Value::as_str)
        .unwrap_or("<no error field>");
    format!("{status} {error}")
}


#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let url = std::env::args().nth(1).unwrap_or_else(|| "http://127.0.0.1:5000/chat".to_string());
    let clients = 4usize; // concurrent
    let total = 40usize; // total requests
    let messages = vec![
        "What is the capital of France?",
        "How many legs does a spider have?",
        "Name a prime number larger than 100.",
        "What does CPU stand for?",
        "Who wrote Hamlet?",
        "Translate 'good morning' to Spanish.",
    ];

    let client = Client::builder()
        .pool_idle_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(300))
        .build()?;
    let mut hist = Histogram::<u64>::new(3)?;
    let mut errors: BTreeMap<String, usize> = BTreeMap::new();

    let start = Instant::now();
    let mut tasks = vec![];
    for _ in 0..clients {
        let client = client.clone();
        let url = url.clone();
        let messages = messages.clone();
        tasks.push(tokio::spawn(async move {
            let mut latencies = vec![];
            let mut failures = vec![];
            for _ in 0..(total / clients) {
                let m = {
                    let mut rng = thread_rng();
                    messages.choose(&mut rng).copied().unwrap_or("hello")
                };
                let t0 = Instant::now();
                let res = client.post(&url).json(&serde_json::json!({"message": m})).send().await;
                let dur = t0.elapsed();
                match res {
                    Ok(r) if r.status().is_success() => latencies.push(dur),
                    Ok(r) => {
                        let status = r.status().as_u16();
                        let body = r.json::<Value>().await.ok();
                        failures.push(failure_key(status, body.as_ref()));
                    }
                    Err(e) => failures.push(format!("transport {}", e.without_url())),
                }
            }
            (latencies, failures)
        }));
    }

    for t in tasks {
        let (ls, fs) = t.await?;
        for d in ls { hist.record(d.as_millis() as u64).ok(); }
        for f in fs { *errors.entry(f).or_default() += 1; }
    }

    println!("ran {} reqs in {:?}", total, start.elapsed());
    println!("errors: {}", errors.values().sum::<usize>());
    for (kind, n) in &errors {
        println!("  {n:>5}  {kind}");
    }
    println!("p50: {} ms", hist.value_at_quantile(0.50));
    println!("p95: {} ms", hist.value_at_quantile(0.95));
    println!("p99: {} ms", hist.value_at_quantile(0.99));
    Ok(())
}

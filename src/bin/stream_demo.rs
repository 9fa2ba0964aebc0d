/// Wires a small streaming graph and feeds it simulated observatory data
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use tracing::info;

use magpipe::algorithm::{ScaleAlgorithm, SumAlgorithm};
use magpipe::streaming::{ComponentSelector, StreamController, StreamGraph};
use magpipe::types::{Channel, DataType, SampleInterval, TimeSeriesSet};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("magpipe=debug,info")
        .init();

    // wire everything up: two conversion nodes feeding one combiner
    let mut graph = StreamGraph::new();
    let volt = graph.add_node(
        "u_volt",
        StreamController::new(
            vec![ComponentSelector::new(None, "BEU")],
            Arc::new(ScaleAlgorithm::new(vec!["BEU".to_string()], 100.0)),
            None,
            0,
            0,
        ),
    )?;
    let bin = graph.add_node(
        "u_bin",
        StreamController::new(
            vec![ComponentSelector::new(None, "BYU")],
            Arc::new(ScaleAlgorithm::new(vec!["BYU".to_string()], 500.0)),
            None,
            0,
            0,
        ),
    )?;
    let combine = graph.add_node(
        "u",
        StreamController::new(
            vec![
                ComponentSelector::new(None, "U_Bin"),
                ComponentSelector::new(None, "U_Volt"),
            ],
            Arc::new(SumAlgorithm::new(
                vec!["U_Bin".to_string(), "U_Volt".to_string()],
                "U",
            )),
            None,
            0,
            0,
        ),
    )?;
    graph.add_edge(
        volt,
        combine,
        HashMap::from([("BEU".to_string(), "U_Volt".to_string())]),
    )?;
    graph.add_edge(
        bin,
        combine,
        HashMap::from([("BYU".to_string(), "U_Bin".to_string())]),
    )?;

    // simulate data
    let start = Utc.with_ymd_and_hms(2019, 1, 1, 0, 2, 0).unwrap();
    let bin_data = Channel::new(
        "LLO",
        "BYU",
        DataType::Variation,
        SampleInterval::Minute,
        start,
        vec![10.0, 20.0, 30.0, 40.0, 50.0],
    );
    let volt_data = Channel::new(
        "LLO",
        "BEU",
        DataType::Variation,
        SampleInterval::Minute,
        start,
        vec![1.0, 2.0, 3.0, 4.0, 5.0],
    );

    let outputs = graph.push(bin, &TimeSeriesSet::from_channels(vec![bin_data])?)?;
    info!("First push produced {} output(s)", outputs.len());

    let outputs = graph.push(volt, &TimeSeriesSet::from_channels(vec![volt_data])?)?;
    for emitted in &outputs {
        for channel in emitted.output.iter() {
            println!(
                "{}: {}/{} @ {} -> {:?}",
                emitted.node, channel.station, channel.channel, channel.start, channel.data
            );
        }
    }
    Ok(())
}

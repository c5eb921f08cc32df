//! The real time playback sink.
//!
//! `play` binds a list of signals to the host audio output. The callback
//! pulls one block per channel through signal cursors; when every channel
//! has ended the sink marks itself done and its watchdog thread tears the
//! stream down off the audio callback. `stop` tears down every sink.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use lazy_static::lazy_static;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::input::{channel_cursors, ZIn};
use crate::value::V;
use crate::vm::{def, Thread};
use crate::workspace::GTable;

struct PlayerHandle {
    done: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

lazy_static! {
    static ref PLAYERS: Mutex<Vec<PlayerHandle>> = Mutex::new(Vec::new());
}

/// The audio callback body: fill each interleaved channel from its
/// cursor, zero unfilled frames, and report whether every channel ended.
fn fill_output(
    th: &mut Thread,
    ins: &mut [ZIn],
    data: &mut [f32],
    channels: usize,
) -> Result<bool> {
    let frames = data.len() / channels;
    let mut all_done = true;
    for c in 0..channels {
        if c >= ins.len() {
            for f in 0..frames {
                data[f * channels + c] = 0.0;
            }
            continue;
        }
        let mut n = frames;
        let done = ins[c].fill_f32(th, &mut n, &mut data[c..], channels)?;
        for f in n..frames {
            data[f * channels + c] = 0.0;
        }
        all_done = all_done && done;
    }
    Ok(all_done)
}

/// The body of one sink thread: open the device, run the stream until
/// done or stopped, then drop it here rather than in the callback.
fn run_player(mut th: Thread, mut ins: Vec<ZIn>, done: Arc<AtomicBool>, stop: Arc<AtomicBool>) {
    let host = cpal::default_host();
    let device = match host.default_output_device() {
        Some(d) => d,
        None => {
            tracing::error!("play : no output device");
            done.store(true, Ordering::SeqCst);
            return;
        }
    };
    let config = match device.default_output_config() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("play : no output config : {e}");
            done.store(true, Ordering::SeqCst);
            return;
        }
    };
    let mut config: cpal::StreamConfig = config.into();
    config.sample_rate = cpal::SampleRate(th.rate.sample_rate as u32);
    let channels = config.channels as usize;
    let done_cb = done.clone();
    let stream = device.build_output_stream(
        &config,
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            if done_cb.load(Ordering::Relaxed) {
                data.fill(0.0);
                return;
            }
            match fill_output(&mut th, &mut ins, data, channels) {
                Ok(true) => done_cb.store(true, Ordering::SeqCst),
                Ok(false) => {}
                Err(e) => {
                    // never propagate across the host boundary
                    tracing::error!("error in real time, stopping player : {e}");
                    data.fill(0.0);
                    done_cb.store(true, Ordering::SeqCst);
                }
            }
        },
        |e| tracing::error!("stream error : {e}"),
        None,
    );
    let stream = match stream {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("play : open stream : {e}");
            done.store(true, Ordering::SeqCst);
            return;
        }
    };
    if let Err(e) = stream.play() {
        tracing::error!("play : start stream : {e}");
        done.store(true, Ordering::SeqCst);
        return;
    }
    tracing::info!("started output stream");
    while !done.load(Ordering::SeqCst) && !stop.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(250));
    }
    done.store(true, Ordering::SeqCst);
    drop(stream);
}

fn play_(th: &mut Thread, _: &crate::fun::Prim) -> Result<()> {
    let v = th.pop()?;
    if !v.is_list() {
        return Err(crate::error::wrong_type("play : s", "List", v.type_name()));
    }
    let ins = channel_cursors(th, v, "play : s")?;
    let audio_thread = th.fork();
    let done = Arc::new(AtomicBool::new(false));
    let stop = Arc::new(AtomicBool::new(false));
    let handle = {
        let done = done.clone();
        let stop = stop.clone();
        std::thread::Builder::new()
            .name("sapf-player".to_string())
            .spawn(move || run_player(audio_thread, ins, done, stop))
            .map_err(|e| Error::Failed(format!("play : {e}")))?
    };
    let mut players = PLAYERS.lock().unwrap();
    players.retain(|p| !p.done.load(Ordering::SeqCst));
    players.push(PlayerHandle {
        done,
        stop,
        join: Some(handle),
    });
    Ok(())
}

/// Tear down all playing sinks synchronously.
pub fn stop_all() {
    let mut players = PLAYERS.lock().unwrap();
    for p in players.iter_mut() {
        p.stop.store(true, Ordering::SeqCst);
    }
    for p in players.iter_mut() {
        if let Some(join) = p.join.take() {
            let _ = join.join();
        }
    }
    players.clear();
}

fn stop_(_th: &mut Thread, _: &crate::fun::Prim) -> Result<()> {
    stop_all();
    Ok(())
}

pub fn install(t: &GTable) {
    def(t, "play", 1, 0, play_, "(in --> ) play a signal or list of signals on the audio output.");
    def(t, "stop", 0, 0, stop_, "( --> ) stop all playing sinks.");
}

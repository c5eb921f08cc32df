//! Sound file writing: finite signals to 32 bit float WAV.

use std::fs::File;
use std::io::prelude::*;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::error::{indefinite_op, Error, Result};
use crate::input::{channel_cursors, ZIn};
use crate::vm::{def, Thread};
use crate::workspace::GTable;

// WAV files are little endian.
#[inline]
fn write32<W: Write>(writer: &mut W, x: u32) -> std::io::Result<()> {
    writer.write_all(&[x as u8, (x >> 8) as u8, (x >> 16) as u8, (x >> 24) as u8])
}

#[inline]
fn write16<W: Write>(writer: &mut W, x: u16) -> std::io::Result<()> {
    writer.write_all(&[x as u8, (x >> 8) as u8])
}

/// Write a WAV header for 32 bit float data, including the header of the
/// data block.
fn write_wav_header<W: Write>(
    writer: &mut W,
    data_length: usize,
    channels: usize,
    sample_rate: usize,
) -> std::io::Result<()> {
    writer.write_all(b"RIFF")?;
    write32(writer, data_length as u32 + 36)?;
    writer.write_all(b"WAVE")?;
    writer.write_all(b"fmt ")?;
    // length of fmt block
    write32(writer, 16)?;
    // audio data format 3 = WAVE_FORMAT_IEEE_FLOAT
    write16(writer, 3)?;
    write16(writer, channels as u16)?;
    write32(writer, sample_rate as u32)?;
    // data rate in bytes per second
    write32(writer, (sample_rate * channels * 4) as u32)?;
    // sample frame length in bytes
    write16(writer, channels as u16 * 4)?;
    // bits per sample
    write16(writer, 32)?;
    writer.write_all(b"data")?;
    write32(writer, data_length as u32)?;
    Ok(())
}

/// Write non-interleaved channel data as an interleaved float WAV.
pub fn write_wav_f32<W: Write>(
    writer: &mut W,
    channels: &[Vec<f32>],
    sample_rate: usize,
) -> std::io::Result<()> {
    let frames = channels.iter().map(|c| c.len()).max().unwrap_or(0);
    let data_length = frames * channels.len() * 4;
    write_wav_header(writer, data_length, channels.len(), sample_rate)?;
    for i in 0..frames {
        for channel in channels {
            let x = channel.get(i).copied().unwrap_or(0.0);
            writer.write_all(&x.to_le_bytes())?;
        }
    }
    Ok(())
}

/// Resolve a recording path: relative names land in the recordings
/// directory and get a `.wav` extension.
pub fn recording_path(th: &Thread, name: &str) -> PathBuf {
    let mut path = PathBuf::from(name);
    if path.extension().is_none() {
        path.set_extension("wav");
    }
    if path.is_relative() {
        if let Some(dir) = &th.vm.recordings_dir {
            return dir.join(path);
        }
    }
    path
}

/// Pull a finite signal to exhaustion into a sample buffer.
fn drain_channel(th: &mut Thread, zin: &mut ZIn) -> Result<Vec<f32>> {
    let mut out = Vec::new();
    let mut chunk = [0.0f32; 4096];
    loop {
        let mut n = chunk.len();
        let done = zin.fill_f32(th, &mut n, &mut chunk, 1)?;
        out.extend_from_slice(&chunk[..n]);
        if done || n == 0 {
            return Ok(out);
        }
    }
}

fn record_(th: &mut Thread, _: &crate::fun::Prim) -> Result<()> {
    let name = th.pop_string(">sf : filename")?;
    let v = th.pop()?;
    if !v.is_finite() {
        return Err(indefinite_op(">sf"));
    }
    let mut ins = channel_cursors(th, v, ">sf : in")?;
    let mut channels = Vec::with_capacity(ins.len());
    for zin in &mut ins {
        if zin.is_constant() {
            return Err(indefinite_op(">sf"));
        }
        channels.push(drain_channel(th, zin)?);
    }
    let path = recording_path(th, name.as_str());
    let file = File::create(&path)
        .map_err(|e| Error::Failed(format!(">sf : {} : {}", path.display(), e)))?;
    let mut writer = BufWriter::new(file);
    write_wav_f32(&mut writer, &channels, th.rate.sample_rate as usize)?;
    writer.flush()?;
    println!("wrote {}", path.display());
    Ok(())
}

/// Load and run a source file in the current thread.
pub fn load_file(th: &mut Thread, path: &Path) -> Result<()> {
    let source = std::fs::read_to_string(path)
        .map_err(|e| Error::Failed(format!("load : {} : {}", path.display(), e)))?;
    let fun = crate::parser::compile(th, &source)?;
    th.call_fun(&fun)
}

fn load_(th: &mut Thread, _: &crate::fun::Prim) -> Result<()> {
    let name = th.pop_string("load : filename")?;
    load_file(th, Path::new(name.as_str()))
}

pub fn install(t: &GTable) {
    def(t, ">sf", 2, 0, record_, "(in filename --> ) write a finite signal or list of signals to a float WAV file.");
    def(t, "load", 1, 0, load_, "(filename --> ) run a source file in the current workspace.");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_layout() {
        let mut buf = Vec::new();
        write_wav_f32(&mut buf, &[vec![0.5f32, -0.5]], 48000).unwrap();
        assert_eq!(&buf[0..4], b"RIFF");
        assert_eq!(&buf[8..12], b"WAVE");
        assert_eq!(&buf[12..16], b"fmt ");
        // IEEE float format tag
        assert_eq!(u16::from_le_bytes([buf[20], buf[21]]), 3);
        assert_eq!(u16::from_le_bytes([buf[22], buf[23]]), 1);
        assert_eq!(u32::from_le_bytes([buf[24], buf[25], buf[26], buf[27]]), 48000);
        assert_eq!(&buf[36..40], b"data");
        // two frames of one channel, four bytes each
        assert_eq!(u32::from_le_bytes([buf[40], buf[41], buf[42], buf[43]]), 8);
        let first = f32::from_le_bytes([buf[44], buf[45], buf[46], buf[47]]);
        assert_eq!(first, 0.5);
    }

    #[test]
    fn short_channels_are_zero_padded() {
        let mut buf = Vec::new();
        write_wav_f32(&mut buf, &[vec![1.0f32, 1.0], vec![2.0f32]], 44100).unwrap();
        // frame 2: channel 0 = 1.0, channel 1 padded to 0.0
        let c0 = f32::from_le_bytes([buf[52], buf[53], buf[54], buf[55]]);
        let c1 = f32::from_le_bytes([buf[56], buf[57], buf[58], buf[59]]);
        assert_eq!(c0, 1.0);
        assert_eq!(c1, 0.0);
    }
}

//! Audio output using rodio.
//!
//! rodio's output stream has to stay on the thread that opened it, so the
//! stream and sink live on a dedicated audio thread. [`RodioPlayer`] talks to
//! it with request/reply messages and gives up on a call after the configured
//! timeout instead of stalling the caller.

use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    thread,
    time::Duration,
};

use crossbeam_channel::{RecvTimeoutError, Sender};
use rodio::{
    cpal::traits::{DeviceTrait, HostTrait},
    Decoder, OutputStream, OutputStreamHandle, Sink, Source,
};

use super::{MediaPlayer, STOPPED_POSITION};
use crate::{JukeboxError, Result};

/// How long opening the output device may take at startup.
const OPEN_TIMEOUT: Duration = Duration::from_secs(5);

enum Request {
    Load(PathBuf),
    Play,
    Stop,
    IsPlaying,
    Position,
}

enum Reply {
    Done,
    Playing(bool),
    Position(f64),
}

type Envelope = (Request, Sender<Result<Reply>>);

/// Handle to the audio thread.
pub struct RodioPlayer {
    requests: Sender<Envelope>,
    timeout: Duration,
}

impl RodioPlayer {
    /// Opens `output_device` (or the system default) and starts the audio
    /// thread. Every later call waits at most `timeout` for an answer.
    pub fn open(output_device: Option<&str>, volume: f32, timeout: Duration) -> Result<Self> {
        let (requests, inbox) = crossbeam_channel::bounded::<Envelope>(4);
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<()>>(1);
        let device = output_device.map(str::to_owned);

        // The thread exits once every request sender is gone.
        thread::Builder::new()
            .name("audio-output".to_string())
            .spawn(move || {
                let mut output = match AudioOutput::open(device.as_deref(), volume) {
                    Ok(output) => {
                        let _ = ready_tx.send(Ok(()));
                        output
                    }
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };
                for (request, reply) in inbox {
                    let _ = reply.send(output.handle(request));
                }
                output.stop();
                tracing::debug!("audio thread stopped");
            })?;

        match ready_rx.recv_timeout(OPEN_TIMEOUT) {
            Ok(result) => result?,
            Err(_) => {
                return Err(JukeboxError::AdapterTimeout {
                    operation: "open",
                    timeout: OPEN_TIMEOUT,
                })
            }
        }
        tracing::info!(device = output_device.unwrap_or("default"), volume, "audio output ready");

        Ok(Self { requests, timeout })
    }

    fn call(&self, operation: &'static str, request: Request) -> Result<Reply> {
        let timed_out = || JukeboxError::AdapterTimeout {
            operation,
            timeout: self.timeout,
        };

        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        self.requests
            .send_timeout((request, reply_tx), self.timeout)
            .map_err(|_| timed_out())?;

        match reply_rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(timed_out()),
            Err(RecvTimeoutError::Disconnected) => {
                Err(JukeboxError::playback("audio thread has exited"))
            }
        }
    }
}

impl MediaPlayer for RodioPlayer {
    fn load(&mut self, path: &Path) -> Result<()> {
        self.call("load", Request::Load(path.to_path_buf())).map(|_| ())
    }

    fn play(&mut self) -> Result<()> {
        self.call("play", Request::Play).map(|_| ())
    }

    fn stop(&mut self) -> Result<()> {
        self.call("stop", Request::Stop).map(|_| ())
    }

    fn is_playing(&mut self) -> Result<bool> {
        match self.call("is_playing", Request::IsPlaying)? {
            Reply::Playing(playing) => Ok(playing),
            _ => Err(JukeboxError::playback("unexpected reply to is_playing")),
        }
    }

    fn position(&mut self) -> Result<f64> {
        match self.call("position", Request::Position)? {
            Reply::Position(position) => Ok(position),
            _ => Err(JukeboxError::playback("unexpected reply to position")),
        }
    }
}

type FileDecoder = Decoder<BufReader<File>>;

/// State owned by the audio thread.
struct AudioOutput {
    _stream: OutputStream,
    handle: OutputStreamHandle,
    volume: f32,
    media: Option<PathBuf>,
    decoded: Option<FileDecoder>,
    duration: Option<Duration>,
    sink: Option<Sink>,
}

impl AudioOutput {
    fn open(device: Option<&str>, volume: f32) -> Result<Self> {
        let (stream, handle) = match device {
            Some(name) => {
                let device = find_output_device(name)?;
                OutputStream::try_from_device(&device).map_err(JukeboxError::playback)?
            }
            None => OutputStream::try_default().map_err(JukeboxError::playback)?,
        };

        Ok(Self {
            _stream: stream,
            handle,
            volume,
            media: None,
            decoded: None,
            duration: None,
            sink: None,
        })
    }

    fn handle(&mut self, request: Request) -> Result<Reply> {
        match request {
            Request::Load(path) => {
                self.stop();
                let decoder = decode(&path)?;
                self.duration = decoder.total_duration();
                self.decoded = Some(decoder);
                self.media = Some(path);
                Ok(Reply::Done)
            }
            Request::Play => {
                self.play()?;
                Ok(Reply::Done)
            }
            Request::Stop => {
                self.stop();
                Ok(Reply::Done)
            }
            Request::IsPlaying => Ok(Reply::Playing(self.is_playing())),
            Request::Position => Ok(Reply::Position(self.position())),
        }
    }

    fn play(&mut self) -> Result<()> {
        self.stop();
        let source = match self.decoded.take() {
            Some(decoder) => decoder,
            None => {
                let media = self
                    .media
                    .as_ref()
                    .ok_or_else(|| JukeboxError::playback("play requested without media"))?;
                decode(media)?
            }
        };

        let sink = Sink::try_new(&self.handle).map_err(JukeboxError::playback)?;
        sink.set_volume(self.volume);
        sink.append(source);
        sink.play();
        self.sink = Some(sink);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
    }

    fn is_playing(&self) -> bool {
        self.sink
            .as_ref()
            .map(|sink| !sink.empty() && !sink.is_paused())
            .unwrap_or(false)
    }

    fn position(&self) -> f64 {
        let Some(sink) = &self.sink else {
            return STOPPED_POSITION;
        };
        // a drained sink played its source to the end
        if sink.empty() {
            return 1.0;
        }
        match self.duration {
            Some(total) if !total.is_zero() => {
                (sink.get_pos().as_secs_f64() / total.as_secs_f64()).clamp(0.0, 1.0)
            }
            _ => 0.0,
        }
    }
}

fn decode(path: &Path) -> Result<FileDecoder> {
    let file = File::open(path)?;
    Decoder::new(BufReader::new(file)).map_err(JukeboxError::playback)
}

fn find_output_device(name: &str) -> Result<rodio::cpal::Device> {
    let host = rodio::cpal::default_host();
    let mut devices = host.output_devices().map_err(JukeboxError::playback)?;
    devices
        .find(|device| device.name().map(|n| n == name).unwrap_or(false))
        .ok_or_else(|| JukeboxError::playback(format!("no output device named `{name}`")))
}

//! The blocking loop between the driver byte stream and the switch engine.
//!
//! One iteration reads a chunk from the inbound stream, deframes as many
//! complete envelopes as arrived, and processes each to completion
//! (including all egress writes) before the next read. There is exactly one
//! thread; the only suspension points are the blocking read and writes.

use std::io::{Read, Write};

use anyhow::{bail, Context, Result};
use tracing::{debug, warn};

use vswitch_core::{Action, Switch};
use vswitch_packet::MacAddr;
use vswitch_proto::{encode_message, Deframer, Message, MSG_TYPE_CONTROL};

const READ_CHUNK: usize = 64 * 1024;

/// Moves envelopes between the driver stream endpoints and a [`Switch`].
pub struct Pump<R, W> {
    switch: Switch,
    reader: R,
    writer: W,
    deframer: Deframer,
    macs_seen: bool,
}

impl<R: Read, W: Write> Pump<R, W> {
    pub fn new(switch: Switch, reader: R, writer: W) -> Self {
        Self {
            switch,
            reader,
            writer,
            deframer: Deframer::new(),
            macs_seen: false,
        }
    }

    pub fn switch(&self) -> &Switch {
        &self.switch
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    /// Run until the inbound stream reaches EOF.
    ///
    /// Per-frame problems are dropped and logged at debug verbosity;
    /// protocol framing violations and write failures are fatal and
    /// surface as errors.
    pub fn run(&mut self) -> Result<()> {
        let mut buf = [0u8; READ_CHUNK];
        loop {
            let n = self.reader.read(&mut buf).context("read driver stream")?;
            if n == 0 {
                // Clean EOF; a buffered partial envelope is discarded.
                debug!(
                    buffered = self.deframer.buffered(),
                    "driver stream closed"
                );
                return Ok(());
            }
            self.deframer.push(&buf[..n]);
            while let Some(msg) = self
                .deframer
                .next_message()
                .context("deframe driver stream")?
            {
                self.dispatch(msg)?;
            }
        }
    }

    fn dispatch(&mut self, msg: Message) -> Result<()> {
        if msg.msg_type == MSG_TYPE_CONTROL {
            self.handle_control(&msg.payload);
            return Ok(());
        }

        let port = msg.msg_type;
        if usize::from(port) > self.switch.ports().len() {
            bail!("driver sent a frame for nonexistent port {port}");
        }

        match self.switch.process_frame(port, &msg.payload) {
            Ok(actions) => self.emit(&actions)?,
            Err(drop) => debug!(port, %drop, "dropping frame"),
        }
        Ok(())
    }

    /// The first control message is the port MAC table; later ones are
    /// command text for an interactive CLI this switch does not have.
    fn handle_control(&mut self, payload: &[u8]) {
        if !self.macs_seen {
            self.macs_seen = true;
            for (i, chunk) in payload.chunks_exact(6).enumerate() {
                let index = (i + 1) as u16;
                let mac = MacAddr(chunk.try_into().expect("chunks_exact yields 6 bytes"));
                if self.switch.set_port_mac(index, mac) {
                    debug!(port = index, %mac, "port MAC assigned");
                } else {
                    warn!(port = index, %mac, "driver reported MAC for unknown port");
                }
            }
            return;
        }

        let text = String::from_utf8_lossy(payload);
        let text = text.trim_end_matches(['\n', '\0']);
        debug!(command = %text, "ignoring control command");
    }

    fn emit(&mut self, actions: &[Action]) -> Result<()> {
        for Action::EmitFrame { port, frame } in actions {
            let wire = encode_message(*port, frame).context("encode egress frame")?;
            self.writer.write_all(&wire).context("write egress frame")?;
        }
        self.writer.flush().context("flush egress stream")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use vswitch_core::{PortSpec, PortTable};

    fn test_switch(specs: &[&str]) -> Switch {
        let specs: Vec<PortSpec> = specs.iter().map(|s| s.parse().unwrap()).collect();
        Switch::new(PortTable::from_specs(specs))
    }

    fn mac_control(macs: &[[u8; 6]]) -> Vec<u8> {
        let payload: Vec<u8> = macs.iter().flatten().copied().collect();
        encode_message(MSG_TYPE_CONTROL, &payload).unwrap()
    }

    #[test]
    fn first_control_message_assigns_port_macs() {
        let macs = [[0x02, 0, 0, 0, 0, 1], [0x02, 0, 0, 0, 0, 2]];
        let mut pump = Pump::new(
            test_switch(&["p1", "p2"]),
            Cursor::new(mac_control(&macs)),
            Vec::new(),
        );
        pump.run().unwrap();

        let ports = pump.switch().ports();
        assert_eq!(ports.get(1).unwrap().mac(), Some(MacAddr(macs[0])));
        assert_eq!(ports.get(2).unwrap().mac(), Some(MacAddr(macs[1])));
    }

    #[test]
    fn later_control_messages_are_ignored() {
        let mut input = mac_control(&[[0x02, 0, 0, 0, 0, 1]]);
        input.extend_from_slice(&encode_message(MSG_TYPE_CONTROL, b"help\n").unwrap());

        let mut pump = Pump::new(test_switch(&["p1"]), Cursor::new(input), Vec::new());
        pump.run().unwrap();
        assert!(pump.writer().is_empty());
    }

    #[test]
    fn partial_trailing_envelope_is_discarded_at_eof() {
        let mut input = mac_control(&[[0x02, 0, 0, 0, 0, 1]]);
        // Promise 20 bytes, deliver 2.
        input.extend_from_slice(&[0x00, 0x14, 0x00, 0x01, 0xaa, 0xbb]);

        let mut pump = Pump::new(test_switch(&["p1"]), Cursor::new(input), Vec::new());
        pump.run().unwrap();
    }

    #[test]
    fn undersized_size_field_is_fatal() {
        let mut pump = Pump::new(
            test_switch(&["p1"]),
            Cursor::new(vec![0x00, 0x02, 0x00, 0x00]),
            Vec::new(),
        );
        assert!(pump.run().is_err());
    }

    #[test]
    fn frame_for_nonexistent_port_is_fatal() {
        let input = encode_message(7, &[0u8; 64]).unwrap();
        let mut pump = Pump::new(test_switch(&["p1", "p2"]), Cursor::new(input), Vec::new());
        assert!(pump.run().is_err());
    }

    #[test]
    fn dropped_frames_do_not_stop_the_loop() {
        // A 10-byte runt, then a valid broadcast that must still flood.
        let mut input = mac_control(&[[0x02, 0, 0, 0, 0, 1], [0x02, 0, 0, 0, 0, 2]]);
        input.extend_from_slice(&encode_message(1, &[0u8; 10]).unwrap());

        let mut frame = Vec::new();
        frame.extend_from_slice(&[0xff; 6]);
        frame.extend_from_slice(&[0x02, 0, 0, 0, 0, 0xaa]);
        frame.extend_from_slice(&0x0800u16.to_be_bytes());
        frame.extend_from_slice(b"still alive");
        input.extend_from_slice(&encode_message(1, &frame).unwrap());

        let mut pump = Pump::new(
            test_switch(&["p1", "p2"]),
            Cursor::new(input),
            Vec::new(),
        );
        pump.run().unwrap();

        let out = vswitch_proto::decode_message(pump.writer()).unwrap();
        assert_eq!(out.msg_type, 2);
        assert_eq!(out.payload, frame.as_slice());
    }
}

//! A reliable, connection-oriented transport engine over an unreliable
//! datagram substrate.
//!
//! This crate is pure Rust logic: no threads, no locks, no FFI. One
//! [`Engine`] holds the protocol state for exactly one peer; the caller owns
//! scheduling, time, and the actual datagram socket.

mod ack;
mod codec;
mod config;
mod congestion;
mod engine;
mod error;
mod flush;
mod input;
mod rtt;
mod seq;
mod segment;
mod timing;
mod window;

pub use codec::{Command, Header, HEADER_LEN};
pub use config::{Config, Nodelay};
pub use engine::Engine;
pub use error::{ConfigError, InputError, RecvError, SendError};

#[cfg(test)]
mod tests {
    use super::*;

    fn wire(a: &mut Engine, b_inbox: std::rc::Rc<std::cell::RefCell<Vec<Vec<u8>>>>) {
        let inbox = b_inbox;
        a.set_output(move |bytes| inbox.borrow_mut().push(bytes.to_vec()));
    }

    #[test]
    fn loopback_delivers_a_short_message_in_order() {
        let a_to_b = std::rc::Rc::new(std::cell::RefCell::new(Vec::<Vec<u8>>::new()));
        let b_to_a = std::rc::Rc::new(std::cell::RefCell::new(Vec::<Vec<u8>>::new()));

        let cfg_a = Config::new(42).with_nodelay(Nodelay::Fast).with_interval(10);
        let cfg_b = Config::new(42).with_nodelay(Nodelay::Fast).with_interval(10);
        let mut a = Engine::create(cfg_a);
        let mut b = Engine::create(cfg_b);
        wire(&mut a, a_to_b.clone());
        wire(&mut b, b_to_a.clone());

        a.send(b"Hello, reliable world!").unwrap();

        let mut t = 0u32;
        let mut delivered = None;
        for _ in 0..200 {
            for dgram in a_to_b.borrow_mut().drain(..) {
                b.input(&dgram).unwrap();
            }
            for dgram in b_to_a.borrow_mut().drain(..) {
                a.input(&dgram).unwrap();
            }
            a.update(t);
            b.update(t);

            let mut out = [0u8; 64];
            if let Ok(n) = b.recv(&mut out) {
                delivered = Some(out[..n].to_vec());
                break;
            }
            t += 10;
        }

        assert_eq!(delivered.as_deref(), Some(&b"Hello, reliable world!"[..]));
    }

    #[test]
    fn empty_send_is_rejected() {
        let mut e = Engine::create(Config::new(1));
        assert_eq!(e.send(&[]), Err(SendError::EmptyData));
    }

    #[test]
    fn recv_on_empty_engine_reports_no_data() {
        let mut e = Engine::create(Config::new(1));
        let mut out = [0u8; 16];
        assert_eq!(e.recv(&mut out), Err(RecvError::NoData));
    }

    #[test]
    fn input_rejects_foreign_conversation_id() {
        let mut a = Engine::create(Config::new(1));
        let mut b = Engine::create(Config::new(2));
        a.set_output(|_| {});
        b.set_output(|_| {});
        a.send(b"x").unwrap();

        let captured = std::rc::Rc::new(std::cell::RefCell::new(Vec::<Vec<u8>>::new()));
        let sink = captured.clone();
        a.set_output(move |bytes| sink.borrow_mut().push(bytes.to_vec()));
        a.update(0);

        let mut saw_mismatch = false;
        for dgram in captured.borrow().iter() {
            if b.input(dgram).is_err() {
                saw_mismatch = true;
            }
        }
        assert!(saw_mismatch);
    }
}

//! Keyboard input: arrow keys move, WASD fires, q or Esc quits

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use log::debug;
use shared::Direction;
use std::thread;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Move(Direction),
    Fire(Direction),
    Quit,
}

/// Maps one key event to a player command. Releases are ignored.
pub fn command_for_key(key: &KeyEvent) -> Option<Command> {
    if key.kind == KeyEventKind::Release {
        return None;
    }

    match key.code {
        KeyCode::Up => Some(Command::Move(Direction::Up)),
        KeyCode::Down => Some(Command::Move(Direction::Down)),
        KeyCode::Left => Some(Command::Move(Direction::Left)),
        KeyCode::Right => Some(Command::Move(Direction::Right)),
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(Command::Quit)
        }
        KeyCode::Char(c) => match c.to_ascii_lowercase() {
            'w' => Some(Command::Fire(Direction::Up)),
            's' => Some(Command::Fire(Direction::Down)),
            'a' => Some(Command::Fire(Direction::Left)),
            'd' => Some(Command::Fire(Direction::Right)),
            'q' => Some(Command::Quit),
            _ => None,
        },
        KeyCode::Esc => Some(Command::Quit),
        _ => None,
    }
}

/// Reads terminal events on a dedicated thread so the async loops never block
/// on stdin. The thread exits once the receiver is dropped.
pub fn spawn_input_reader() -> mpsc::UnboundedReceiver<Command> {
    let (tx, rx) = mpsc::unbounded_channel();

    thread::spawn(move || loop {
        match event::read() {
            Ok(Event::Key(key)) => {
                if let Some(command) = command_for_key(&key) {
                    if tx.send(command).is_err() {
                        break;
                    }
                }
            }
            Ok(_) => {}
            Err(e) => {
                debug!("Input reader stopped: {}", e);
                break;
            }
        }
    });

    rx
}

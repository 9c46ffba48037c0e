//! Terminal renderer. Reads the local engine state and draws one frame; no
//! game logic happens here.

use crossterm::{
    cursor,
    style::{self, Color, Print},
    terminal, ExecutableCommand, QueueableCommand,
};
use shared::{Direction, Entity, GameState, Positioner, RoundState};
use std::io::{self, Write};
use uuid::Uuid;

const C_WALL: Color = Color::DarkBlue;
const C_LOCAL_PLAYER: Color = Color::Green;
const C_PLAYER: Color = Color::Red;
const C_LASER: Color = Color::Yellow;
const C_HUD: Color = Color::White;
const C_HINT: Color = Color::DarkGrey;

/// Puts the terminal in raw mode on an alternate screen and restores it when
/// dropped.
pub struct TerminalGuard;

impl TerminalGuard {
    pub fn new() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        let mut out = io::stdout();
        out.execute(terminal::EnterAlternateScreen)?;
        out.execute(cursor::Hide)?;
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let mut out = io::stdout();
        let _ = out.execute(cursor::Show);
        let _ = out.execute(terminal::LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();
    }
}

fn laser_glyph(direction: Direction) -> char {
    match direction {
        Direction::Up | Direction::Down => '|',
        Direction::Left | Direction::Right => '-',
        Direction::Stop => '*',
    }
}

/// Player names with their scores, best first
pub fn scoreboard(state: &GameState) -> Vec<(String, u32)> {
    let mut rows: Vec<(String, u32)> = state
        .players()
        .map(|player| (player.name.clone(), state.score(player.id)))
        .collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    rows
}

/// Text shown while waiting for the next round
pub fn round_banner(state: &GameState, now: u64) -> Option<String> {
    match state.round_state() {
        RoundState::InProgress => None,
        RoundState::WaitingToRestart {
            winner,
            new_round_at,
        } => {
            let name = state
                .player(winner)
                .map(|player| player.name.clone())
                .unwrap_or_else(|| "Someone".to_string());
            let seconds = new_round_at.saturating_sub(now).div_ceil(1000);
            Some(format!("{} won the round! Next round in {}s", name, seconds))
        }
    }
}

/// Draws one complete frame at time `now`
pub fn render<W: Write>(
    out: &mut W,
    state: &GameState,
    local_player: Option<Uuid>,
    now: u64,
) -> io::Result<()> {
    out.queue(terminal::Clear(terminal::ClearType::All))?;

    let (width, height) = state.map().dimensions();

    out.queue(style::SetForegroundColor(C_WALL))?;
    for wall in state.map().walls() {
        out.queue(cursor::MoveTo(wall.x as u16, wall.y as u16))?;
        out.queue(Print('█'))?;
    }

    for entity in state.entities() {
        let position = entity.position_at(now);
        if !state.map().contains(position) {
            continue;
        }
        let (color, glyph) = match entity {
            Entity::Player(player) if Some(player.id) == local_player => {
                (C_LOCAL_PLAYER, player.icon)
            }
            Entity::Player(player) => (C_PLAYER, player.icon),
            Entity::Laser(laser) => (C_LASER, laser_glyph(laser.direction)),
        };
        out.queue(cursor::MoveTo(position.x as u16, position.y as u16))?;
        out.queue(style::SetForegroundColor(color))?;
        out.queue(Print(glyph))?;
    }

    let mut row = height as u16 + 1;
    out.queue(style::SetForegroundColor(C_HUD))?;
    for (name, score) in scoreboard(state) {
        out.queue(cursor::MoveTo(0, row))?;
        out.queue(Print(format!("{:<16} {}", name, score)))?;
        row += 1;
    }

    if let Some(banner) = round_banner(state, now) {
        let x = (width as u16).saturating_sub(banner.chars().count() as u16) / 2;
        out.queue(cursor::MoveTo(x, height as u16 / 2))?;
        out.queue(style::SetForegroundColor(C_LOCAL_PLAYER))?;
        out.queue(Print(banner))?;
    }

    out.queue(cursor::MoveTo(0, row + 1))?;
    out.queue(style::SetForegroundColor(C_HINT))?;
    out.queue(Print("Arrows: move   WASD: fire   Q: quit"))?;

    out.queue(style::ResetColor)?;
    out.flush()
}

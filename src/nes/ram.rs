// Source for memory addresses: https://datacrystal.romhacking.net/wiki/Super_Mario_Bros.:RAM_map

/// Read-only view of the console's work RAM.
pub trait Ram {
    fn peek(&self, addr: u16) -> u8;

    /// Reads consecutive one-digit-per-byte values as a decimal number.
    fn peek_digits(&self, start: u16, len: u16) -> u32 {
        (start..start + len).fold(0, |acc, addr| acc * 10 + (self.peek(addr) & 0x0F) as u32)
    }
}

impl Ram for [u8] {
    fn peek(&self, addr: u16) -> u8 {
        self.get(addr as usize).copied().unwrap_or(0)
    }
}

impl Ram for Vec<u8> {
    fn peek(&self, addr: u16) -> u8 {
        self.as_slice().peek(addr)
    }
}

pub const PLAYER_STATE: u16 = 0x000E;
pub const FLOAT_STATE: u16 = 0x001D;
pub const MARIO_LEVEL_X: u16 = 0x006D;
pub const MARIO_SCREEN_X: u16 = 0x0086;
pub const MARIO_Y_VIEWPORT: u16 = 0x00B5;
pub const MARIO_Y_PIXEL: u16 = 0x03B8;
pub const PLAYER_STATUS: u16 = 0x0756;
pub const LIVES: u16 = 0x075A;
pub const STAGE: u16 = 0x075C;
pub const WORLD: u16 = 0x075F;
pub const OPER_MODE: u16 = 0x0770;
pub const SCORE_DIGITS: u16 = 0x07DE;
pub const COIN_DIGITS: u16 = 0x07ED;
pub const TIME_DIGITS: u16 = 0x07F8;

// Values of PLAYER_STATE
pub const STATE_DEAD: u8 = 0x06;
pub const STATE_NORMAL: u8 = 0x08;
pub const STATE_DYING: u8 = 0x0B;

// Value of FLOAT_STATE while sliding down the flagpole
pub const FLOAT_FLAGPOLE: u8 = 0x03;
// Value of OPER_MODE once a world has been cleared
pub const OPER_MODE_VICTORY: u8 = 0x02;
// Value of OPER_MODE during play
pub const OPER_MODE_GAME: u8 = 0x01;
// LIVES after the last life is lost
pub const LIVES_GAME_OVER: u8 = 0xFF;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digits_are_read_most_significant_first() {
        let mut ram = vec![0u8; 0x800];
        ram[TIME_DIGITS as usize] = 3;
        ram[TIME_DIGITS as usize + 1] = 9;
        ram[TIME_DIGITS as usize + 2] = 8;
        assert_eq!(ram.peek_digits(TIME_DIGITS, 3), 398);
    }

    #[test]
    fn out_of_range_reads_are_zero() {
        let ram = vec![0xAAu8; 4];
        assert_eq!(ram.peek(3), 0xAA);
        assert_eq!(ram.peek(0x4000), 0);
    }
}

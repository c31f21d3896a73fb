use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::registers::{
    ALU_DIVIDEND_0, ALU_DIVISOR_LO, ALU_MULTIPLICAND_LO, ALU_MULTIPLIER_LO, ALU_REMAINDER_LO,
    ALU_RESULT_0, ALU_SIGN, ALU_STATUS, RegisterFile,
};

/// Chip cycles from arming a multiply to its result
pub const MULTIPLY_DELAY: u32 = 6;
/// Chip cycles from arming a divide to its result
pub const DIVIDE_DELAY: u32 = 8;

const STATUS_BUSY: u8 = 0x80;
const STATUS_MULTIPLY: u8 = 0x01;

/// Multiply/divide unit ($4820-$482F)
///
/// Operands are sampled when the countdown expires; the sign mode is latched
/// when the operation is armed. Until then the result registers keep
/// whatever the previous operation left.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alu {
    mul_wait: u32,
    div_wait: u32,
    mul_signed: bool,
    div_signed: bool,
}

impl Alu {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write to $4825
    pub fn arm_multiply(&mut self, regs: &mut RegisterFile) {
        regs.set(ALU_STATUS, regs.get(ALU_STATUS) | STATUS_BUSY | STATUS_MULTIPLY);
        self.mul_signed = regs.get(ALU_SIGN) & 1 != 0;
        self.mul_wait = MULTIPLY_DELAY;
    }

    /// Write to $4827
    pub fn arm_divide(&mut self, regs: &mut RegisterFile) {
        regs.set(ALU_STATUS, regs.get(ALU_STATUS) | STATUS_BUSY);
        self.div_signed = regs.get(ALU_SIGN) & 1 != 0;
        self.div_wait = DIVIDE_DELAY;
    }

    /// An operation is still counting down
    pub fn pending(&self) -> bool {
        self.mul_wait != 0 || self.div_wait != 0
    }

    /// Advance both countdowns by one chip cycle
    pub fn tick(&mut self, regs: &mut RegisterFile) {
        if self.mul_wait != 0 {
            self.mul_wait -= 1;
            if self.mul_wait == 0 {
                self.multiply(regs);
            }
        }
        if self.div_wait != 0 {
            self.div_wait -= 1;
            if self.div_wait == 0 {
                self.divide(regs);
            }
        }
    }

    fn multiply(&self, regs: &mut RegisterFile) {
        let multiplicand = regs.get_u16(ALU_MULTIPLICAND_LO);
        let multiplier = regs.get_u16(ALU_MULTIPLIER_LO);

        let product = if self.mul_signed {
            ((multiplicand as i16 as i32) * (multiplier as i16 as i32)) as u32
        } else {
            multiplicand as u32 * multiplier as u32
        };

        trace!("multiply {:04X} * {:04X} = {:08X}", multiplicand, multiplier, product);
        regs.set_u32(ALU_RESULT_0, product);
        regs.set(ALU_STATUS, regs.get(ALU_STATUS) & !STATUS_BUSY);
    }

    /// 32-bit dividend by 16-bit divisor
    ///
    /// A zero divisor is not trapped: the quotient comes out with every bit
    /// set and the remainder is the low half of the dividend.
    fn divide(&self, regs: &mut RegisterFile) {
        let dividend = regs.get_u32(ALU_DIVIDEND_0);
        let divisor = regs.get_u16(ALU_DIVISOR_LO);

        let (quotient, remainder) = if divisor == 0 {
            (u32::MAX, dividend as u16)
        } else if self.div_signed {
            let dividend = dividend as i32;
            let divisor = divisor as i16 as i32;
            (
                dividend.wrapping_div(divisor) as u32,
                dividend.wrapping_rem(divisor) as u16,
            )
        } else {
            let divisor = divisor as u32;
            (dividend / divisor, (dividend % divisor) as u16)
        };

        trace!("divide {:08X} / {:04X} = {:08X} r {:04X}", dividend, divisor, quotient, remainder);
        regs.set_u32(ALU_RESULT_0, quotient);
        regs.set_u16(ALU_REMAINDER_LO, remainder);
        regs.set(ALU_STATUS, regs.get(ALU_STATUS) & !STATUS_BUSY);
    }
}

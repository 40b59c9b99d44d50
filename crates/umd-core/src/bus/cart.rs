use crate::{
    bus::{Bus, BusWidth, Lanes, WriteStrobe},
    translator::Translator,
};

/// Borrowed view of the bus as seen through the active profile's translator.
///
/// Plain `read_*`/`write_*` move protocol values untouched; the `*_payload`
/// variants pass every byte through the translator's payload conversion.
pub struct CartBus<'a> {
    bus: &'a mut dyn Bus,
    translator: &'a mut dyn Translator,
    width: BusWidth,
}

impl<'a> CartBus<'a> {
    pub fn new(bus: &'a mut dyn Bus, translator: &'a mut dyn Translator, width: BusWidth) -> Self {
        Self {
            bus,
            translator,
            width,
        }
    }

    pub fn width(&self) -> BusWidth {
        self.width
    }

    pub fn read_byte(&mut self, address: u32) -> u8 {
        let physical = self.translator.translate(self.bus, address);
        self.bus.latch_address(physical.address, physical.width);
        let lanes = self.bus.strobe_read(self.width);
        lanes.lane(self.translator.route_byte(address).lane)
    }

    /// Big-endian word at `address`. Byte-wide buses compose it from two
    /// reads.
    pub fn read_word(&mut self, address: u32) -> u16 {
        match self.width {
            BusWidth::Eight => {
                u16::from_be_bytes([
                    self.read_byte(address),
                    self.read_byte(address.wrapping_add(1)),
                ])
            }
            BusWidth::Sixteen => {
                let physical = self.translator.translate(self.bus, address);
                self.bus.latch_address(physical.address, physical.width);
                self.bus.strobe_read(BusWidth::Sixteen).word()
            }
        }
    }

    pub fn write_byte(&mut self, address: u32, value: u8) {
        let route = self.translator.route_byte(address);
        let physical = self.translator.translate(self.bus, address);
        self.bus.latch_address(physical.address, physical.width);
        self.bus
            .strobe_write(Lanes::default().with_lane(route.lane, value), route.strobe);
    }

    pub fn write_word(&mut self, address: u32, value: u16) {
        match self.width {
            BusWidth::Eight => {
                let [high, low] = value.to_be_bytes();
                self.write_byte(address, high);
                self.write_byte(address.wrapping_add(1), low);
            }
            BusWidth::Sixteen => {
                let physical = self.translator.translate(self.bus, address);
                self.bus.latch_address(physical.address, physical.width);
                self.bus
                    .strobe_write(Lanes::from_word(value), WriteStrobe::Write);
            }
        }
    }

    pub fn read_payload(&mut self, address: u32) -> u8 {
        let raw = self.read_byte(address);
        self.translator.payload_in(raw)
    }

    pub fn write_payload(&mut self, address: u32, value: u8) {
        let raw = self.translator.payload_out(value);
        self.write_byte(address, raw);
    }

    /// Payload word at `address`, high byte first.
    pub fn read_payload_word(&mut self, address: u32) -> u16 {
        let [high, low] = self.read_word(address).to_be_bytes();
        u16::from_be_bytes([self.translator.payload_in(high), self.translator.payload_in(low)])
    }

    pub fn write_payload_word(&mut self, address: u32, value: u16) {
        let [high, low] = value.to_be_bytes();
        let raw = u16::from_be_bytes([
            self.translator.payload_out(high),
            self.translator.payload_out(low),
        ]);
        self.write_word(address, raw);
    }

    /// Raw bus value a payload byte turns into.
    pub fn encode_payload(&self, value: u8) -> u8 {
        self.translator.payload_out(value)
    }

    pub fn begin_flash_command(&mut self) {
        self.translator.begin_flash_command(self.bus);
    }

    pub fn end_flash_command(&mut self) {
        self.translator.end_flash_command(self.bus);
    }

    pub fn set_sram(&mut self, enabled: bool) -> bool {
        self.translator.set_sram(self.bus, enabled)
    }

    pub fn millis(&mut self) -> u64 {
        self.bus.millis()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bus::{Line, mock::MockBus},
        translator::{Linear, MirroredBus, linear::LaneStrobes},
    };

    fn genesis() -> Linear {
        Linear::word_wide(LaneStrobes {
            lower: Line::Ctrl(5),
            upper: Line::Ctrl(6),
            time: Some(Line::Ctrl(7)),
        })
    }

    #[test]
    fn odd_byte_writes_strobe_upper_lane() {
        let mut bus = MockBus::default();
        let mut translator = genesis();
        let mut cart = CartBus::new(&mut bus, &mut translator, BusWidth::Sixteen);

        cart.write_byte(0x201, 0x5A);
        cart.write_byte(0x200, 0xA5);

        let writes: Vec<_> = bus.writes().collect();
        assert_eq!(writes, vec![
            (
                0x201,
                Lanes::new(0x00, 0x5A),
                WriteStrobe::Lane(Line::Ctrl(6))
            ),
            (
                0x200,
                Lanes::new(0xA5, 0x00),
                WriteStrobe::Lane(Line::Ctrl(5))
            ),
        ]);
    }

    #[test]
    fn byte_reads_pick_lane_by_parity() {
        let mut bus = MockBus::default();
        bus.mem.insert(0x100, Lanes::new(0x12, 0x34));
        bus.mem.insert(0x101, Lanes::new(0x12, 0x34));
        let mut translator = genesis();
        let mut cart = CartBus::new(&mut bus, &mut translator, BusWidth::Sixteen);

        assert_eq!(cart.read_byte(0x100), 0x12);
        assert_eq!(cart.read_byte(0x101), 0x34);
        assert_eq!(cart.read_word(0x100), 0x1234);
    }

    #[test]
    fn word_writes_use_write_enable() {
        let mut bus = MockBus::default();
        let mut translator = genesis();
        let mut cart = CartBus::new(&mut bus, &mut translator, BusWidth::Sixteen);

        cart.write_word(0xAAA, 0xAA00);
        assert_eq!(bus.writes().collect::<Vec<_>>(), vec![(
            0xAAA,
            Lanes::new(0xAA, 0x00),
            WriteStrobe::Write
        )]);
    }

    #[test]
    fn payload_is_mirrored_but_raw_bytes_are_not() {
        let mut bus = MockBus::default();
        bus.mem.insert(0x10, Lanes::from_byte(0x01));
        let mut translator = MirroredBus;
        let mut cart = CartBus::new(&mut bus, &mut translator, BusWidth::Eight);

        assert_eq!(cart.read_byte(0x10), 0x01);
        assert_eq!(cart.read_payload(0x10), 0x80);

        cart.write_payload(0x20, 0x0F);
        cart.write_byte(0x21, 0x0F);
        assert_eq!(bus.mem[&0x20].lower, 0xF0);
        assert_eq!(bus.mem[&0x21].lower, 0x0F);
    }

    #[test]
    fn mirrored_payload_words_reverse_each_byte() {
        let mut bus = MockBus::default();
        bus.mem.insert(0x10, Lanes::from_byte(0x01));
        bus.mem.insert(0x11, Lanes::from_byte(0x02));
        let mut translator = MirroredBus;
        let mut cart = CartBus::new(&mut bus, &mut translator, BusWidth::Eight);

        assert_eq!(cart.read_word(0x10), 0x0102);
        assert_eq!(cart.read_payload_word(0x10), 0x8040);

        cart.write_payload_word(0x20, 0x0F01);
        assert_eq!(bus.mem[&0x20].lower, 0xF0);
        assert_eq!(bus.mem[&0x21].lower, 0x80);
    }

    #[test]
    fn byte_wide_word_at_top_of_range_wraps() {
        let mut bus = MockBus::default();
        bus.mem.insert(0xFF_FFFF, Lanes::from_byte(0x12));
        bus.mem.insert(0x0000, Lanes::from_byte(0x34));
        let mut translator = Linear::byte_wide();
        let mut cart = CartBus::new(&mut bus, &mut translator, BusWidth::Eight);

        assert_eq!(cart.read_word(u32::MAX), 0x1234);
        cart.write_word(u32::MAX, 0xABCD);
        assert_eq!(bus.mem[&0xFF_FFFF].lower, 0xAB);
        assert_eq!(bus.mem[&0x0000].lower, 0xCD);
    }

    #[test]
    fn byte_wide_words_are_big_endian() {
        let mut bus = MockBus::default();
        bus.mem.insert(0x7FFA, Lanes::from_byte(0xCD));
        bus.mem.insert(0x7FFB, Lanes::from_byte(0xAB));
        let mut translator = Linear::byte_wide();
        let mut cart = CartBus::new(&mut bus, &mut translator, BusWidth::Eight);
        assert_eq!(cart.read_word(0x7FFA), 0xCDAB);
    }
}

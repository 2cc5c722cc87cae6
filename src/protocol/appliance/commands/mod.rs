//! SkyCooker command vocabulary: opcodes, their descriptors, model families
//! and the enumerations carried in command payloads.
use crate::core::CommandSpec;

//==================================================================================Opcodes
pub const OP_GET_VERSION: u8 = 0x01;
pub const OP_TURN_ON: u8 = 0x03;
pub const OP_TURN_OFF: u8 = 0x04;
pub const OP_SET_MAIN_MODE: u8 = 0x05;
pub const OP_GET_STATUS: u8 = 0x06;
pub const OP_SET_TEMPERATURE: u8 = 0x0B;
pub const OP_SET_COOKING_TIME: u8 = 0x0C;
pub const OP_SET_DELAY_TIME: u8 = 0x14;
pub const OP_SET_POST_HEAT: u8 = 0x16;
pub const OP_AUTH: u8 = 0xFF;

/// Lowest target temperature accepted by the appliance (°C).
pub const MIN_TEMPERATURE: u8 = 30;
/// Highest target temperature accepted by the appliance (°C).
pub const MAX_TEMPERATURE: u8 = 120;

/// Accepted cooking durations, in minutes.
pub const COOKING_TIME_RANGE: core::ops::RangeInclusive<u16> = 1..=24 * 60;
/// Accepted delayed-start waits, in minutes.
pub const DELAY_TIME_RANGE: core::ops::RangeInclusive<u16> = 1..=24 * 60;

/// Descriptor catalogue, one entry per opcode.
pub const COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        opcode: OP_GET_VERSION,
        label: "get_version",
        default_timeout_ms: 5_000,
    },
    CommandSpec {
        opcode: OP_TURN_ON,
        label: "turn_on",
        default_timeout_ms: 1_500,
    },
    CommandSpec {
        opcode: OP_TURN_OFF,
        label: "turn_off",
        default_timeout_ms: 1_500,
    },
    CommandSpec {
        opcode: OP_SET_MAIN_MODE,
        label: "set_main_mode",
        default_timeout_ms: 1_500,
    },
    CommandSpec {
        opcode: OP_GET_STATUS,
        label: "get_status",
        default_timeout_ms: 1_500,
    },
    CommandSpec {
        opcode: OP_SET_TEMPERATURE,
        label: "set_temperature",
        default_timeout_ms: 1_500,
    },
    CommandSpec {
        opcode: OP_SET_COOKING_TIME,
        label: "set_cooking_time",
        default_timeout_ms: 1_500,
    },
    CommandSpec {
        opcode: OP_SET_DELAY_TIME,
        label: "set_delay_time",
        default_timeout_ms: 1_500,
    },
    CommandSpec {
        opcode: OP_SET_POST_HEAT,
        label: "set_post_heat",
        default_timeout_ms: 1_500,
    },
    CommandSpec {
        opcode: OP_AUTH,
        label: "auth",
        default_timeout_ms: 3_000,
    },
];

/// Descriptor for `opcode`, if it belongs to the vocabulary.
pub fn spec_for(opcode: u8) -> Option<&'static CommandSpec> {
    COMMANDS.iter().find(|spec| spec.opcode == opcode)
}

/// Clamp a target temperature to the range the appliance accepts.
pub fn limit_temperature(celsius: u8) -> u8 {
    celsius.clamp(MIN_TEMPERATURE, MAX_TEMPERATURE)
}

//==================================================================================ModelFamily

/// Protocol family shared by a group of retail models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFamily {
    /// RMC-M40S … RMC-M49S multicookers.
    M40S,
    /// Models speaking the kettle-derived protocol.
    M216S,
}

impl ModelFamily {
    pub fn from_model(model: &str) -> Option<Self> {
        match model {
            "RMC-M40S" | "RMC-M41S" | "RMC-M42S" | "RMC-M43S" | "RMC-M44S" | "RMC-M45S"
            | "RMC-M46S" | "RMC-M47S" | "RMC-M48S" | "RMC-M49S" => Some(ModelFamily::M40S),
            "RK-M216S" | "RK-M215S" | "RK-M223S" | "RK-G200S" | "RK-G211S" => {
                Some(ModelFamily::M216S)
            }
            _ => None,
        }
    }
}

//==================================================================================CookingMode

/// Cooking programs, as encoded in `set_main_mode` and status replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CookingMode {
    SlowCook = 0x00,
    Stew = 0x01,
    Bake = 0x02,
    Steam = 0x03,
    Yogurt = 0x04,
    Multicook = 0x05,
    Soup = 0x06,
    Pasta = 0x07,
    Rice = 0x08,
    Bread = 0x09,
    Dessert = 0x0A,
    KeepWarm = 0x0B,
    Off = 0xFF,
}

impl CookingMode {
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0x00 => CookingMode::SlowCook,
            0x01 => CookingMode::Stew,
            0x02 => CookingMode::Bake,
            0x03 => CookingMode::Steam,
            0x04 => CookingMode::Yogurt,
            0x05 => CookingMode::Multicook,
            0x06 => CookingMode::Soup,
            0x07 => CookingMode::Pasta,
            0x08 => CookingMode::Rice,
            0x09 => CookingMode::Bread,
            0x0A => CookingMode::Dessert,
            0x0B => CookingMode::KeepWarm,
            0xFF => CookingMode::Off,
            _ => return None,
        })
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            CookingMode::SlowCook => "slow cook",
            CookingMode::Stew => "stew",
            CookingMode::Bake => "bake",
            CookingMode::Steam => "steam",
            CookingMode::Yogurt => "yogurt",
            CookingMode::Multicook => "multicook",
            CookingMode::Soup => "soup",
            CookingMode::Pasta => "pasta",
            CookingMode::Rice => "rice",
            CookingMode::Bread => "bread",
            CookingMode::Dessert => "dessert",
            CookingMode::KeepWarm => "keep warm",
            CookingMode::Off => "off",
        }
    }
}

//==================================================================================StatusCode

/// Program stage reported in byte 11 of the status reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CookerStatusCode {
    Hibernation = 0x00,
    Setting = 0x01,
    Waiting = 0x02,
    Heat = 0x03,
    Assistance = 0x04,
    Cooking = 0x05,
    Heating = 0x06,
}

impl CookerStatusCode {
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0x00 => CookerStatusCode::Hibernation,
            0x01 => CookerStatusCode::Setting,
            0x02 => CookerStatusCode::Waiting,
            0x03 => CookerStatusCode::Heat,
            0x04 => CookerStatusCode::Assistance,
            0x05 => CookerStatusCode::Cooking,
            0x06 => CookerStatusCode::Heating,
            _ => return None,
        })
    }
}

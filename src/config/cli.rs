use crate::core::time_normalizer::RawSlotInput;
use crate::utils::error::{Result, SchedulingError};
use crate::utils::validation::{validate_path, validate_range, Validate};
use clap::{Args, Parser, Subcommand, ValueEnum};
use uuid::Uuid;

#[derive(Debug, Clone, Parser)]
#[command(name = "barber-slots")]
#[command(about = "Appointment slot scheduling for a barber shop")]
pub struct CliConfig {
    #[arg(long, short, default_value = "shop.toml")]
    pub config: String,

    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}

impl OutputFormat {
    /// JSON/CSV 的 stdout 只放資料，狀態訊息改走 stderr
    pub fn is_machine_readable(&self) -> bool {
        !matches!(self, OutputFormat::Table)
    }
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// 列出店員
    Providers,
    /// 某位店員某一天的所有時段
    Schedule {
        #[arg(long)]
        provider: u32,
        #[arg(long)]
        date: String,
        #[arg(long, help = "Mask customer names and hide phone numbers")]
        public: bool,
    },
    /// 整個月每天的負載
    Month {
        #[arg(long)]
        provider: u32,
        #[arg(long)]
        year: i32,
        #[arg(long)]
        month: u32,
    },
    Reserve {
        #[arg(long)]
        provider: u32,
        #[command(flatten)]
        slot: SlotArgs,
        #[arg(long)]
        name: String,
        #[arg(long)]
        phone: String,
    },
    /// 改期或修改顧客資料，沒給的欄位維持原值
    Update {
        id: Uuid,
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        time: Option<String>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        phone: Option<String>,
    },
    Cancel {
        id: Uuid,
    },
    CloseSlot {
        #[arg(long)]
        provider: u32,
        #[command(flatten)]
        slot: SlotArgs,
        #[arg(long)]
        reason: Option<String>,
    },
    OpenSlot {
        #[arg(long)]
        provider: u32,
        #[command(flatten)]
        slot: SlotArgs,
    },
    CloseDay {
        #[arg(long)]
        provider: u32,
        #[arg(long)]
        date: String,
        #[arg(long)]
        reason: Option<String>,
    },
    OpenDay {
        #[arg(long)]
        provider: u32,
        #[arg(long)]
        date: String,
    },
    /// 列出日期區間內的預約 (含頭尾)
    List {
        #[arg(long)]
        provider: Option<u32>,
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
    },
    /// 只驗證設定檔
    Check,
}

/// 時段可以用 `--at 2025-04-15T10:15` 或 `--date 2025-04-15 --time 10:15` 指定
#[derive(Debug, Clone, Args)]
pub struct SlotArgs {
    #[arg(long, conflicts_with_all = ["date", "time"])]
    pub at: Option<String>,
    #[arg(long)]
    pub date: Option<String>,
    #[arg(long)]
    pub time: Option<String>,
}

impl SlotArgs {
    pub fn raw_input(&self) -> Result<RawSlotInput<'_>> {
        match (&self.at, &self.date, &self.time) {
            (Some(at), _, _) => Ok(RawSlotInput::Combined(at.as_str())),
            (None, Some(date), Some(time)) => Ok(RawSlotInput::Separate {
                date: date.as_str(),
                time: time.as_str(),
            }),
            (None, Some(date), None) => Ok(RawSlotInput::DateOnly(date.as_str())),
            (None, None, _) => Err(SchedulingError::InvalidInput {
                field: "slot".to_string(),
                value: String::new(),
                reason: "use --at or --date with --time".to_string(),
            }),
        }
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validate_path("config", &self.config)?;

        match &self.command {
            Command::Month { month, .. } => validate_range("month", *month, 1, 12),
            Command::Reserve { slot, .. }
            | Command::CloseSlot { slot, .. }
            | Command::OpenSlot { slot, .. } => slot.raw_input().map(|_| ()),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliConfig {
        CliConfig::try_parse_from(std::iter::once("barber-slots").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn test_only_table_is_for_humans() {
        assert!(!parse(&["providers"]).format.is_machine_readable());
        assert!(parse(&["--format", "json", "providers"]).format.is_machine_readable());
        assert!(parse(&["--format", "csv", "providers"]).format.is_machine_readable());
    }

    #[test]
    fn test_reserve_with_separate_date_and_time() {
        let config = parse(&[
            "reserve", "--provider", "1", "--date", "2025-04-15", "--time", "10:15", "--name",
            "Ali Veli", "--phone", "05321234567",
        ]);

        assert_eq!(config.config, "shop.toml");
        assert_eq!(config.format, OutputFormat::Table);
        match &config.command {
            Command::Reserve { provider, slot, .. } => {
                assert_eq!(*provider, 1);
                assert_eq!(
                    slot.raw_input().unwrap(),
                    RawSlotInput::Separate {
                        date: "2025-04-15",
                        time: "10:15"
                    }
                );
            }
            other => panic!("unexpected command {:?}", other),
        }
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_slot_requires_some_input() {
        let config = parse(&["open-slot", "--provider", "1"]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_at_conflicts_with_date() {
        let result = CliConfig::try_parse_from([
            "barber-slots",
            "close-slot",
            "--provider",
            "1",
            "--at",
            "2025-04-15T10:15",
            "--date",
            "2025-04-15",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_month_range_validation() {
        let config = parse(&[
            "--format", "json", "month", "--provider", "1", "--year", "2025", "--month", "13",
        ]);
        assert_eq!(config.format, OutputFormat::Json);
        assert!(config.validate().is_err());
    }
}

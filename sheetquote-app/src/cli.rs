use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// DXF 图纸几何分析与切割报价工具。
#[derive(Debug, Parser)]
#[command(name = "sheetquote", version, about)]
pub struct Cli {
    /// 配置文件路径（默认读取 SHEETQUOTE_CONFIG 或 ./config/default.toml）
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// 输出逐个图元的周长与面积明细
    Analyze {
        file: PathBuf,
        /// 以 JSON 输出
        #[arg(long)]
        json: bool,
    },
    /// 按材料与数量计算报价
    Quote {
        file: PathBuf,
        /// 材料编码，例如 CR18、INOX1/8、ALUM2,5
        #[arg(long, short, value_name = "CODE")]
        material: String,
        /// 件数
        #[arg(long, short, value_name = "N", allow_negative_numbers = true)]
        quantity: i64,
        #[arg(long)]
        json: bool,
    },
    /// 导出供绘图使用的折线图元（JSON）
    Render {
        file: PathBuf,
        /// 输出文件，缺省时写到标准输出
        #[arg(long, short, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// 列出材料费率表
    Materials {
        #[arg(long)]
        json: bool,
    },
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn quote_accepts_negative_quantity_for_validation_downstream() {
        let cli = Cli::try_parse_from([
            "sheetquote",
            "quote",
            "part.dxf",
            "--material",
            "CR18",
            "--quantity",
            "-2",
        ])
        .expect("参数解析失败");
        match cli.command {
            Command::Quote {
                material, quantity, ..
            } => {
                assert_eq!(material, "CR18");
                assert_eq!(quantity, -2);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn config_flag_is_global() {
        let cli = Cli::try_parse_from(["sheetquote", "materials", "--config", "custom.toml"])
            .expect("参数解析失败");
        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
    }
}

//! 消息原型表

use anyhow::Result;
use clap::Args;
use fingerlink_protocol::{MessagePrototype, SchemaRegistry};

/// 原型表参数
#[derive(Args, Debug)]
pub struct SchemaCommand {
    /// 只显示指定 ID
    #[arg(long)]
    pub id: Option<u8>,
}

impl SchemaCommand {
    pub fn execute(&self) -> Result<()> {
        let registry = SchemaRegistry::standard();
        match self.id {
            Some(id) => println!("{}", format_prototype(registry.prototype_for(id)?)),
            None => {
                println!("{:>3}  {:<22} {:>5}  FIELDS", "ID", "NAME", "BYTES");
                for prototype in registry.all_prototypes() {
                    println!("{}", format_prototype(prototype));
                }
            },
        }
        Ok(())
    }
}

fn format_prototype(prototype: &MessagePrototype) -> String {
    let fields: Vec<String> = prototype
        .fields()
        .iter()
        .map(|f| format!("{}: {}", f.name, f.ty.wire_name()))
        .collect();
    format!(
        "{:>3}  {:<22} {:>5}  {}",
        prototype.id(),
        prototype.name(),
        prototype.payload_len(),
        fields.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use fingerlink_protocol::ID_MOTOR_CONTROL;

    #[test]
    fn test_format_motor_control() {
        let prototype = SchemaRegistry::standard()
            .prototype_for(ID_MOTOR_CONTROL)
            .unwrap();
        let line = format_prototype(prototype);
        assert!(line.contains("MotorControl"));
        assert!(line.contains("control_value: FLOAT"));
        assert!(line.trim_start().starts_with('1'));
    }

    #[test]
    fn test_unknown_id_fails() {
        let cmd = SchemaCommand { id: Some(200) };
        assert!(cmd.execute().is_err());
    }
}

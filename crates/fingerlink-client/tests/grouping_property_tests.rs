//! 指令分组属性测试

use fingerlink_client::calculate_command_groups;
use fingerlink_protocol::{Message, MessageKind, create_motor_control};
use proptest::prelude::*;

fn buffer_strategy() -> impl Strategy<Value = Vec<Message>> {
    prop::collection::vec((0u8..2, -3.0f32..3.0, any::<bool>()), 0..40).prop_map(|entries| {
        entries
            .into_iter()
            .map(|(motor, value, simultaneous)| {
                create_motor_control(MessageKind::Request, motor, 0, value, simultaneous)
            })
            .collect()
    })
}

proptest! {
    /// 各组按序拼接后与原缓冲区完全一致
    #[test]
    fn test_groups_concatenate_to_buffer(buffer in buffer_strategy()) {
        let groups = calculate_command_groups(&buffer);
        let flattened: Vec<Message> = groups.iter().flat_map(|g| g.iter().cloned()).collect();
        prop_assert_eq!(flattened, buffer.clone());
        prop_assert!(groups.iter().all(|g| !g.is_empty()));
    }

    /// 组内除首条外都是 simultaneous，且每个非首组的首条不是
    #[test]
    fn test_group_members_are_simultaneous(buffer in buffer_strategy()) {
        let groups = calculate_command_groups(&buffer);
        for (idx, group) in groups.iter().enumerate() {
            for member in &group[1..] {
                prop_assert!(member.get_bool("simultaneous").unwrap());
            }
            if idx > 0 {
                prop_assert!(!group[0].get_bool("simultaneous").unwrap());
            }
        }
    }
}

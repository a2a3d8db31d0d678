//! Usage text for `/stick` and `/settle`.

use super::types::CommandReply;

const STICK_HELP: &str = "### Talking Stick Commands

**Grant/Revoke Speaking Privileges:**
- `/stick grant @username` - Grant speaking privileges
- `/stick revoke @username` - Revoke speaking privileges
- `/stick list` - List current speakers

**Channel Modes:**
- `/stick mode open` - Everyone can post (default)
- `/stick mode speakers` - Only granted speakers can post
- `/stick mode qa` - Speakers + Q&A participants can post
- `/stick mode locked` - Only admins can post

**Q&A Mode:**
- `/stick qa-grant @username [count]` - Grant question slots (default: 1)

**Help:**
- `/stick help` - Show this help message

**Note:** Use `/settle` command for circuit breaker functionality (see `/settle help`)
";

const SETTLE_HELP: &str = "### Settle Command

Temporarily suppress agent responses to break doom loops.

**Usage:**
- `/settle` - Settle all agents for 20 seconds (default)
- `/settle 45` - Settle all agents for 45 seconds
- `/settle @telos` - Settle specific agent for 20 seconds
- `/settle 30 @telos @aurora` - Settle specific agents for 30 seconds
- `/settle status` - Check current settle state

**Notes:**
- Only administrators can use this command
- Maximum settle duration: 300 seconds (5 minutes)
- Responses from settled agents will vanish completely
- Settle expires silently (no announcement)
";

pub fn stick_help() -> CommandReply {
    CommandReply::ephemeral(STICK_HELP)
}

pub fn settle_help() -> CommandReply {
    CommandReply::ephemeral(SETTLE_HELP)
}

/// SSE framing
pub const SSE_DATA_PREFIX: &str = "data: ";
pub const DONE_SENTINEL: &str = "[DONE]";

/// Keywords that must appear in a completion for it to be treated as code.
/// A completion containing none of these (and no comment marker) is assumed
/// to be prose commentary and is suppressed.
pub const VERILOG_CONTENT_MARKERS: &[&str] = &[
    "module", "begin", "end", "always", "assign", "reg", "wire", "input", "output", "//", "/*",
];

/// Opener/closer keyword pairs for block-closure repair. Counted flat
/// (per pair), not as a stack.
pub const CLOSURE_PAIRS: &[(&str, &str)] = &[
    ("module", "endmodule"),
    ("function", "endfunction"),
    ("task", "endtask"),
    ("begin", "end"),
];

/// Stop sequences sent upstream for code completion requests.
pub const COMPLETION_STOP_SEQUENCES: &[&str] = &["\n\n\n", "endmodule", "endfunction", "endtask"];

/// Codestral fill-in-the-middle markers.
pub const FIM_PREFIX: &str = "<fim_prefix>";
pub const FIM_SUFFIX: &str = "<fim_suffix>";
pub const FIM_MIDDLE: &str = "<fim_middle>";

/// System prompt for the chat assistant.
pub const CHAT_SYSTEM_PROMPT: &str = "You are an expert Verilog hardware engineering assistant. \
You help users write, debug, and simulate Verilog code.\n";

/// Instruction prepended to the submitted module for testbench generation.
pub const TB_INSTRUCTION: &str = "You are a hardware engineering expert. Write a Verilog testbench \
for the following Verilog code. The testbench must dump a waveform with \
`initial begin $dumpfile(\"test.vcd\"); $dumpvars(0, test); end` so the run produces a VCD file \
for gtkwave.\n\n";

/// Upstream request defaults (chat mode).
pub const CHAT_TEMPERATURE: f64 = 0.6;
pub const CHAT_MAX_TOKENS: u32 = 1000;

/// Toolchain binaries the backend shells out to.
pub const LINT_BINARY: &str = "verilator";
pub const COMPILE_BINARY: &str = "iverilog";
pub const SIM_BINARY: &str = "vvp";

/// File names used inside the simulation scratch directory.
pub const SIM_MODULE_FILE: &str = "module.v";
pub const SIM_TB_FILE: &str = "tb.v";
pub const SIM_OUT_FILE: &str = "sim.vvp";
pub const SIM_VCD_FILE: &str = "test.vcd";

mod pipeline;
mod tabs;
